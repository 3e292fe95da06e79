//! `prople-peer-core` provides the peer DID subsystem used by the prople agents
//!
//! It contains the `did:peer` codecs (numAlgo 0, 1, 2 and 4), the DID document model
//! and its builder, and the `DID Exchange` handshake which uses those peer dids to
//! establish a pairwise relationship between two agents without any ledger.
//!
//! Everything is grouped under the [`identity`] domain.
pub mod identity;
