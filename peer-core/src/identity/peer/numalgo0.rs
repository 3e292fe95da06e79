//! `did:peer:0`, a single inception key without any stored document
use crate::identity::doc::{DidDocument, KeyDidMappings};
use crate::identity::key::PublicKey;

use super::types::{assert_num_algo, NumAlgo, PeerDidError, PEER_DID_PREFIX};

pub fn encode(key: &PublicKey) -> String {
    format!("{}0{}", PEER_DID_PREFIX, key.fingerprint())
}

pub fn decode_key(did: &str) -> Result<PublicKey, PeerDidError> {
    assert_num_algo(did, NumAlgo::InceptionKeyWithoutDoc)?;

    let fingerprint = &did[PEER_DID_PREFIX.len() + 1..];
    PublicKey::from_fingerprint(fingerprint).map_err(PeerDidError::from)
}

/// Synthesizes the document of the inception key with the same template `did:key` uses
pub fn decode(did: &str, mappings: &KeyDidMappings) -> Result<DidDocument, PeerDidError> {
    let key = decode_key(did)?;
    mappings.key_document(did, &key).map_err(PeerDidError::from)
}
