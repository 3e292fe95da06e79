//! `did:peer:4`, a hash of the document (short form) optionally followed by the
//! encoded document itself (long form)
use rst_common::standard::serde_json::{self, Map, Value};

use crate::identity::doc::{DidDocument, DocumentAccessor, Purpose};
use crate::identity::key::varint;

use super::numalgo1::multihash_sha256;
use super::types::{assert_num_algo, NumAlgo, PeerDidError, PEER_DID_PREFIX};

const JSON_MULTICODEC: u16 = 0x0200;
const STRIPPED_FIELDS: [&str; 3] = ["id", "alsoKnownAs", "controller"];

/// Both forms of one `did:peer:4` identifier
#[derive(Debug, Clone, PartialEq)]
pub struct PeerDid4 {
    pub long_form: String,
    pub short_form: String,
}

fn without_keys(map: Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .collect()
}

/// Applies `update` to every verification method object of the document json,
/// embedded ones included
fn map_methods(
    map: Map<String, Value>,
    update: impl Fn(Map<String, Value>) -> Map<String, Value>,
) -> Map<String, Value> {
    let method_arrays: Vec<&str> = std::iter::once("verificationMethod")
        .chain(Purpose::ALL.iter().map(|purpose| purpose.property()))
        .collect();

    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Array(items) if method_arrays.contains(&key.as_str()) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Object(method) => Value::Object(update(method)),
                            other => other,
                        })
                        .collect(),
                ),
                other => other,
            };
            (key, value)
        })
        .collect()
}

fn hash_segment(did: &str) -> &str {
    let body = &did[PEER_DID_PREFIX.len() + 1..];
    body.split(':').next().unwrap_or(body)
}

pub fn is_long_form(did: &str) -> bool {
    assert_num_algo(did, NumAlgo::ShortFormAndLongForm).is_ok()
        && did[PEER_DID_PREFIX.len() + 1..].contains(':')
}

/// Short form of a long or short form identifier
pub fn short_form(did: &str) -> Result<String, PeerDidError> {
    assert_num_algo(did, NumAlgo::ShortFormAndLongForm)?;
    Ok(format!("{}4{}", PEER_DID_PREFIX, hash_segment(did)))
}

/// Encodes the document without `id`, `alsoKnownAs` and the controllers, which are
/// all derived from the identifier when decoding
pub fn encode(document: &impl DocumentAccessor) -> Result<PeerDid4, PeerDidError> {
    let body = serde_json::to_value(document.body())
        .map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    let map = match body {
        Value::Object(map) => map,
        _ => return Err(PeerDidError::JSONError("document is not an object".to_string())),
    };

    let stripped = map_methods(without_keys(map, &STRIPPED_FIELDS), |method| {
        without_keys(method, &["controller"])
    });

    let json = serde_json::to_vec(&Value::Object(stripped))
        .map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    let mut prefixed = varint::encode(JSON_MULTICODEC);
    prefixed.extend_from_slice(&json);

    let encoded_document = format!("z{}", bs58::encode(prefixed).into_string());
    let hash = multihash_sha256(encoded_document.as_bytes());

    let short_form = format!("{}4{}", PEER_DID_PREFIX, hash);
    Ok(PeerDid4 {
        long_form: format!("{}:{}", short_form, encoded_document),
        short_form,
    })
}

/// Decodes a long form identifier, the hash is checked before anything else is read
pub fn decode(did: &str) -> Result<DidDocument, PeerDidError> {
    assert_num_algo(did, NumAlgo::ShortFormAndLongForm)?;

    let body = &did[PEER_DID_PREFIX.len() + 1..];
    let (hash, encoded_document) = body
        .split_once(':')
        .ok_or_else(|| PeerDidError::MissingDocument(did.to_string()))?;

    let computed = multihash_sha256(encoded_document.as_bytes());
    if computed != hash {
        return Err(PeerDidError::HashMismatch(format!(
            "{} does not match {}",
            computed, hash
        )));
    }

    let bytes = bs58::decode(&encoded_document[1..])
        .into_vec()
        .map_err(|err| PeerDidError::InvalidGrammar(err.to_string()))?;

    let (codec, consumed) = varint::decode(&bytes)?;
    if codec != JSON_MULTICODEC {
        return Err(PeerDidError::InvalidGrammar(format!(
            "unsupported document codec: {:#x}",
            codec
        )));
    }

    let value: Value = serde_json::from_slice(&bytes[consumed..])
        .map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        _ => return Err(PeerDidError::JSONError("document is not an object".to_string())),
    };

    let mut map = map_methods(map, |mut method| {
        if !method.contains_key("controller") {
            method.insert("controller".to_string(), Value::String(did.to_string()));
        }
        method
    });

    map.insert("id".to_string(), Value::String(did.to_string()));
    map.insert(
        "alsoKnownAs".to_string(),
        Value::Array(vec![Value::String(short_form(did)?)]),
    );

    serde_json::from_value(Value::Object(map)).map_err(|err| PeerDidError::JSONError(err.to_string()))
}
