//! `peer` implements the `did:peer` method
//!
//! Four numbering algorithms are supported, each one lives in its own module:
//!
//! - `numalgo0`: a single inception key, the document is synthesized from the key
//! - `numalgo1`: the hash of a genesis document, the document travels next to the did
//! - `numalgo2`: several inception keys and inline services encoded in the did
//! - `numalgo4`: a hash of the document (short form), optionally followed by the
//!   encoded document (long form)
//!
//! Every decoder checks the full peer did grammar before reading anything else.
pub mod types;
pub use types::{
    assert_num_algo, is_valid_peer_did, num_algo_from_did, DidRepoBuilder, NumAlgo, PeerDidError,
};

pub mod numalgo0;
pub mod numalgo1;
pub mod numalgo2;
pub mod numalgo4;

mod did_peer;
pub use did_peer::{get_alternative_dids, DidPeer};

pub mod record;
pub use record::{DidQuery, DidRecord, DidRecordTags, DidRole};

mod resolver;
pub use resolver::{PeerDidRegistrar, PeerDidResolver};
