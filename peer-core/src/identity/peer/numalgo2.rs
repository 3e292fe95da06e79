//! `did:peer:2`, multiple inception keys and inline services
//!
//! Encoding is the normative direction. Keys are emitted by ascending `#key-N`
//! whatever relationship they belong to, services follow in document order. Decoding
//! assigns `#key-{i}` in string order, so any identifier produced by [`encode`]
//! decodes to a document that encodes back to the same identifier.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use rst_common::standard::serde_json::{self, Map, Value};

use crate::identity::doc::types::fragment;
use crate::identity::doc::{
    DidDocument, DidDocumentBuilder, DocumentAccessor, KeyDidMappings, Purpose, Service,
};
use crate::identity::key::PublicKey;

use super::types::{assert_num_algo, NumAlgo, PeerDidError, PEER_DID_PREFIX};

const SERVICE_PREFIX: char = 'S';
const KEY_ID_PREFIX: &str = "key-";

const ABBREVIATIONS: [(&str, &str); 5] = [
    ("type", "t"),
    ("DIDCommMessaging", "dm"),
    ("serviceEndpoint", "s"),
    ("routingKeys", "r"),
    ("accept", "a"),
];

fn to_short(value: &str) -> Option<&'static str> {
    ABBREVIATIONS
        .iter()
        .find(|(full, _)| *full == value)
        .map(|(_, short)| *short)
}

fn to_full(value: &str) -> Option<&'static str> {
    ABBREVIATIONS
        .iter()
        .find(|(_, short)| *short == value)
        .map(|(full, _)| *full)
}

/// Rewrites object keys and string values of objects, strings inside arrays are kept
fn transform(value: Value, lookup: fn(&str) -> Option<&'static str>) -> Value {
    let swap = |text: String| lookup(&text).map(str::to_string).unwrap_or(text);

    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| {
                    let item = match item {
                        Value::String(text) => Value::String(swap(text)),
                        other => transform(other, lookup),
                    };
                    (swap(key), item)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(_) => item,
                    other => transform(other, lookup),
                })
                .collect(),
        ),
        other => other,
    }
}

pub fn abbreviate(value: Value) -> Value {
    transform(value, to_short)
}

pub fn expand(value: Value) -> Value {
    transform(value, to_full)
}

fn key_index(reference: &str) -> Result<usize, PeerDidError> {
    fragment(reference)
        .and_then(|name| name.strip_prefix('#'))
        .and_then(|name| name.strip_prefix(KEY_ID_PREFIX))
        .and_then(|index| index.parse::<usize>().ok())
        .ok_or_else(|| PeerDidError::InvalidKeyReference(reference.to_string()))
}

fn encode_service(service: &Service) -> Result<String, PeerDidError> {
    let value = serde_json::to_value(service)
        .map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    let stripped = match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "id")
                .collect::<Map<String, Value>>(),
        ),
        _ => return Err(PeerDidError::InvalidService(service.id().to_string())),
    };

    let json = serde_json::to_string(&abbreviate(stripped))
        .map_err(|err| PeerDidError::JSONError(err.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Builds the identifier from the keys and services of `document`
pub fn encode(
    document: &impl DocumentAccessor,
    mappings: &KeyDidMappings,
) -> Result<String, PeerDidError> {
    let mut keys: Vec<(usize, char, String)> = Vec::new();

    for purpose in Purpose::ALL {
        for entry in document.relationship(purpose) {
            let vm = document.resolve_entry(entry)?;
            let index = key_index(vm.id())?;
            let key = mappings.key_from_verification_method(vm)?;

            keys.push((index, purpose.prefix(), key.fingerprint()));
        }
    }

    keys.sort_by_key(|(index, _, _)| *index);

    let mut did = format!("{}2", PEER_DID_PREFIX);
    for (_, prefix, fingerprint) in keys {
        did.push('.');
        did.push(prefix);
        did.push_str(&fingerprint);
    }

    for service in document.services() {
        did.push('.');
        did.push(SERVICE_PREFIX);
        did.push_str(&encode_service(service)?);
    }

    Ok(did)
}

fn decode_services(segment: &str, offset: usize) -> Result<Vec<Service>, PeerDidError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|err| PeerDidError::InvalidService(err.to_string()))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| PeerDidError::InvalidService(err.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut map = match expand(item) {
                Value::Object(map) => map,
                _ => return Err(PeerDidError::InvalidService(segment.to_string())),
            };

            let service_type = map
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_lowercase)
                .ok_or_else(|| PeerDidError::InvalidService("missing type".to_string()))?;

            map.insert(
                "id".to_string(),
                Value::String(format!("#{}-{}", service_type, offset + idx)),
            );

            serde_json::from_value::<Service>(Value::Object(map))
                .map_err(|err| PeerDidError::InvalidService(err.to_string()))
        })
        .collect()
}

/// Rebuilds the document from the identifier, ids are relative and the did is the
/// controller of every verification method
pub fn decode(did: &str, mappings: &KeyDidMappings) -> Result<DidDocument, PeerDidError> {
    assert_num_algo(did, NumAlgo::MultipleInceptionKeyWithoutDoc)?;

    let body = &did[PEER_DID_PREFIX.len() + 1..];
    let mut builder = DidDocumentBuilder::new();
    let mut key_count = 0;
    let mut service_count = 0;

    for segment in body.split('.').skip(1) {
        let mut chars = segment.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| PeerDidError::InvalidGrammar(did.to_string()))?;
        let content = chars.as_str();

        if prefix == SERVICE_PREFIX {
            for service in decode_services(content, service_count)? {
                builder = builder.add_service(service);
                service_count += 1;
            }
            continue;
        }

        let purpose = Purpose::from_prefix(prefix)
            .ok_or_else(|| PeerDidError::InvalidKeyReference(segment.to_string()))?;

        key_count += 1;
        let id = format!("#{}{}", KEY_ID_PREFIX, key_count);
        let key = PublicKey::from_fingerprint(content)?;
        let vm = mappings.verification_method(id.clone(), did.to_string(), &key)?;

        builder = builder
            .add_verification_method(vm)
            .add_to_purpose(purpose, id);
    }

    Ok(builder.build().into_document(did.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json::json;

    use crate::identity::doc::{DidCommV1Service, DraftDocument, VerificationMethod};

    const ED25519_FINGERPRINT: &str = "z6MkkjPVCX7M8D6jJSCQNzYb4T6giuSN8Fm463gWNZ65DMSc";
    const X25519_FINGERPRINT: &str = "z6LSj72tK8brWgZja8NLRwPigth2T9QRiG1uH9oKZuKjdh9p";
    const SERVICE_SEGMENT: &str = "eyJzIjoiaHR0cHM6Ly9leGFtcGxlLmNvbSIsInQiOiJkaWQtY29tbXVuaWNhdGlvbiIsInJlY2lwaWVudEtleXMiOlsiI2tleS0xIl0sImEiOlsiZGlkY29tbS9haXAyO2Vudj1yZmMxOSJdfQ";
    const CREDO_DID: &str = "did:peer:2.Vz6MkkjPVCX7M8D6jJSCQNzYb4T6giuSN8Fm463gWNZ65DMSc.SeyJzIjoiaHR0cHM6Ly9leGFtcGxlLmNvbSIsInQiOiJkaWQtY29tbXVuaWNhdGlvbiIsInByaW9yaXR5IjowLCJyZWNpcGllbnRLZXlzIjpbIiNrZXktMSJdLCJhIjpbImRpZGNvbW0vYWlwMjtlbnY9cmZjMTkiXX0";

    fn method(mappings: &KeyDidMappings, id: &str, fingerprint: &str) -> VerificationMethod {
        let key = PublicKey::from_fingerprint(fingerprint).unwrap();
        mappings
            .verification_method(id.to_string(), "#id".to_string(), &key)
            .unwrap()
    }

    fn service() -> DidCommV1Service {
        DidCommV1Service::new(
            "#service-0".to_string(),
            "https://example.com".to_string(),
            vec!["#key-1".to_string()],
            vec![],
            0,
        )
        .with_accept(vec!["didcomm/aip2;env=rfc19".to_string()])
    }

    fn draft(mappings: &KeyDidMappings) -> DraftDocument {
        DidDocumentBuilder::new()
            .add_verification_method(method(mappings, "#key-1", ED25519_FINGERPRINT))
            .add_service(service())
            .add_authentication("#key-1")
            .build()
    }

    #[test]
    fn test_abbreviate() {
        let service = json!({
            "type": "DIDCommMessaging",
            "serviceEndpoint": {
                "uri": "https://example.com",
                "accept": ["didcomm/v2"],
                "routingKeys": ["did:example:somemediator#somekey"]
            }
        });

        let short = abbreviate(service.clone());
        assert_eq!(
            short,
            json!({
                "t": "dm",
                "s": {
                    "uri": "https://example.com",
                    "a": ["didcomm/v2"],
                    "r": ["did:example:somemediator#somekey"]
                }
            })
        );

        assert_eq!(expand(short), service);
    }

    #[test]
    fn test_encode_service_fixture() {
        let mappings = KeyDidMappings::new();
        let did = encode(&draft(&mappings), &mappings).unwrap();

        assert_eq!(
            did,
            format!(
                "did:peer:2.V{}.S{}",
                ED25519_FINGERPRINT, SERVICE_SEGMENT
            )
        );
    }

    #[test]
    fn test_keys_ordered_by_index() {
        let mappings = KeyDidMappings::new();
        let draft = DidDocumentBuilder::new()
            .add_verification_method(method(&mappings, "#key-2", ED25519_FINGERPRINT))
            .add_verification_method(method(&mappings, "#key-1", X25519_FINGERPRINT))
            .add_authentication("#key-2")
            .add_key_agreement("#key-1")
            .build();

        let did = encode(&draft, &mappings).unwrap();
        assert_eq!(
            did,
            format!(
                "did:peer:2.E{}.V{}",
                X25519_FINGERPRINT, ED25519_FINGERPRINT
            )
        );
    }

    #[test]
    fn test_encode_rejects_non_relative_key_id() {
        let mappings = KeyDidMappings::new();
        let draft = DidDocumentBuilder::new()
            .add_verification_method(method(&mappings, "#signing", ED25519_FINGERPRINT))
            .add_authentication("#signing")
            .build();

        assert!(matches!(
            encode(&draft, &mappings).unwrap_err(),
            PeerDidError::InvalidKeyReference(_)
        ));
    }

    #[test]
    fn test_decode() {
        let mappings = KeyDidMappings::new();
        let document = decode(CREDO_DID, &mappings).unwrap();

        assert_eq!(document.id(), CREDO_DID);
        assert_eq!(document.verification_methods().len(), 1);

        let vm = &document.verification_methods()[0];
        assert_eq!(vm.id(), "#key-1");
        assert_eq!(vm.controller(), CREDO_DID);

        let keys = document.authentication_keys(&mappings).unwrap();
        assert_eq!(keys[0].fingerprint(), ED25519_FINGERPRINT);

        assert_eq!(document.services().len(), 1);
        let service = &document.services()[0];
        assert_eq!(service.id(), "#did-communication-0");
        assert_eq!(service.recipient_keys(), &["#key-1".to_string()]);

        let recipients = document.recipient_keys(&mappings).unwrap();
        assert_eq!(recipients, keys);
    }

    #[test]
    fn test_canonical_round_trip() {
        let mappings = KeyDidMappings::new();
        let did = encode(&draft(&mappings), &mappings).unwrap();

        let decoded = decode(&did, &mappings).unwrap();
        assert_eq!(encode(&decoded, &mappings).unwrap(), did);
    }

    #[test]
    fn test_non_canonical_is_normalized() {
        let mappings = KeyDidMappings::new();
        let decoded = decode(CREDO_DID, &mappings).unwrap();

        let reencoded = encode(&decoded, &mappings).unwrap();
        assert_eq!(
            reencoded,
            format!(
                "did:peer:2.V{}.S{}",
                ED25519_FINGERPRINT, SERVICE_SEGMENT
            )
        );
    }

    #[test]
    fn test_decode_service_array() {
        let mappings = KeyDidMappings::new();
        let services = json!([
            {"t": "dm", "s": {"uri": "https://a.example"}},
            {"t": "dm", "s": {"uri": "https://b.example"}}
        ]);
        let segment = URL_SAFE_NO_PAD.encode(services.to_string());
        let did = format!("did:peer:2.V{}.S{}", ED25519_FINGERPRINT, segment);

        let document = decode(&did, &mappings).unwrap();
        let ids: Vec<&str> = document.services().iter().map(|svc| svc.id()).collect();
        assert_eq!(ids, vec!["#didcommmessaging-0", "#didcommmessaging-1"]);
    }

    #[test]
    fn test_decode_rejects_invalid_grammar() {
        let mappings = KeyDidMappings::new();
        assert!(matches!(
            decode("did:peer:2.Sabc", &mappings).unwrap_err(),
            PeerDidError::InvalidGrammar(_)
        ));
    }
}
