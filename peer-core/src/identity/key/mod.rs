//! `key` provides the fingerprint codec for public keys
//!
//! A fingerprint is `z` + base58btc(varint(multicodec) ++ raw public key bytes).
//! The same fingerprint is used as the `did:key` suffix and as key reference inside
//! `did:peer:0` and `did:peer:2` identifiers.
pub mod types;
pub use types::{KeyError, KeyType};

pub(crate) mod varint;

mod fingerprint;
pub use fingerprint::{convert_ed25519_to_x25519, DidKey, PublicKey};
