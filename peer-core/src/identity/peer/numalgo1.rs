//! `did:peer:1`, the identifier is the hash of the genesis document
use rst_common::standard::serde_json::{self, Map, Value};
use sha2::{Digest, Sha256};

use crate::identity::doc::{DidDocument, DraftDocument};

use super::types::{assert_num_algo, NumAlgo, PeerDidError, PEER_DID_PREFIX};

const MULTIHASH_SHA256: [u8; 2] = [0x12, 0x20];

/// `z` + base58btc(multihash(sha256(bytes)))
pub(super) fn multihash_sha256(bytes: &[u8]) -> String {
    let mut prefixed = MULTIHASH_SHA256.to_vec();
    prefixed.extend_from_slice(&Sha256::digest(bytes));

    format!("z{}", bs58::encode(prefixed).into_string())
}

pub fn encode(draft: &DraftDocument) -> Result<String, PeerDidError> {
    let bytes = draft.to_vec()?;
    Ok(format!("{}1{}", PEER_DID_PREFIX, multihash_sha256(&bytes)))
}

/// Computes the identifier and turns the draft into the final document
pub fn finalize(draft: DraftDocument) -> Result<DidDocument, PeerDidError> {
    let did = encode(&draft)?;
    Ok(draft.into_document(did))
}

/// Checks that `document` hashes to `did` once its `id` is removed
pub fn verify(did: &str, document: &DidDocument) -> Result<(), PeerDidError> {
    assert_num_algo(did, NumAlgo::GenesisDoc)?;

    let computed = encode(&document.clone().into_draft())?;
    if computed != did {
        return Err(PeerDidError::HashMismatch(format!(
            "{} does not match {}",
            computed, did
        )));
    }

    Ok(())
}

/// Checks the document bytes as received against `did`
///
/// Members the document model does not know are kept in the hashed content, only the
/// `id` member is dropped
pub fn verify_payload(did: &str, payload: &[u8]) -> Result<(), PeerDidError> {
    assert_num_algo(did, NumAlgo::GenesisDoc)?;

    let value: Value =
        serde_json::from_slice(payload).map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    let members = match value {
        Value::Object(members) => members,
        _ => {
            return Err(PeerDidError::JSONError(
                "did document must be a json object".to_string(),
            ))
        }
    };

    let genesis: Map<String, Value> = members
        .into_iter()
        .filter(|(key, _)| key != "id")
        .collect();

    let bytes = serde_json::to_vec(&Value::Object(genesis))
        .map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    let computed = format!("{}1{}", PEER_DID_PREFIX, multihash_sha256(&bytes));
    if computed != did {
        return Err(PeerDidError::HashMismatch(format!(
            "{} does not match {}",
            computed, did
        )));
    }

    Ok(())
}
