//! `identity` is a domain used to manage pairwise identities based on the `did:peer` method
//!
//! It has four sub-domains, ordered from the leaf:
//!
//! - `key`
//! - `doc`
//! - `peer`
//! - `connection`
//!
//! ---
//!
//! The `key` sub-domain names public keys. A key is always referenced through its
//! multicodec prefixed and multibase encoded `fingerprint`, the same form used as the
//! suffix of a `did:key`.
//!
//! ---
//!
//! The `doc` sub-domain owns the `DID Document` model. A document is built in two phases,
//! a draft without any identifier and a finalized document once the peer did has been
//! computed from the draft content.
//!
//! ---
//!
//! The `peer` sub-domain converts documents and keys into `did:peer` identifiers and back.
//!
//! ---
//!
//! The `connection` domain runs the `DID Exchange` protocol. Two agents exchange a request,
//! a response and a complete message, each one carrying a peer did and optionally a signed
//! document attachment, and the connection record moves forward through a fixed state machine.
pub mod connection;
pub mod doc;
pub mod key;
pub mod peer;
