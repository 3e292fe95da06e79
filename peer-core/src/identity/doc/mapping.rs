//! Key type to verification method mapping
//!
//! [`KeyDidMappings`] is built once by the caller and passed by reference to every
//! component that needs to turn a key into a verification method, or a verification
//! method back into raw key material.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use rst_common::standard::serde_json::{json, Value};

use crate::identity::key::{convert_ed25519_to_x25519, KeyType, PublicKey};

use super::builder::DidDocumentBuilder;
use super::document::DidDocument;
use super::types::{
    DocError, KeyMaterial, VerificationMethod, BLS12381_2020_CONTEXT, BLS12381_G2_KEY_2020,
    ECDSA_SECP256K1_VERIFICATION_KEY_2019, ED25519_2018_CONTEXT, ED25519_VERIFICATION_KEY_2018,
    ED25519_VERIFICATION_KEY_2020, JSON_WEB_KEY_2020, MULTIKEY, MULTIKEY_CONTEXT,
    SECP256K1_2019_CONTEXT, X25519_2019_CONTEXT, X25519_KEY_AGREEMENT_KEY_2019,
    X25519_KEY_AGREEMENT_KEY_2020,
};

/// Verification method types shared by several key types, the key type comes from
/// the key material itself
const SHARED_TYPES: [&str; 2] = [JSON_WEB_KEY_2020, MULTIKEY];

/// `KeyDidMapping` describes how one key type is expressed inside documents
pub struct KeyDidMapping {
    pub key_type: KeyType,
    pub verification_method_types: &'static [&'static str],
    pub default_method_type: &'static str,
    pub multibase: bool,
    pub key_document: fn(did: &str, key: &PublicKey) -> Result<DidDocument, DocError>,
}

pub struct KeyDidMappings {
    entries: Vec<KeyDidMapping>,
}

impl Default for KeyDidMappings {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDidMappings {
    /// Builds the table of every key type this crate supports
    pub fn new() -> Self {
        Self {
            entries: vec![
                KeyDidMapping {
                    key_type: KeyType::Ed25519,
                    verification_method_types: &[
                        ED25519_VERIFICATION_KEY_2018,
                        ED25519_VERIFICATION_KEY_2020,
                        JSON_WEB_KEY_2020,
                        MULTIKEY,
                    ],
                    default_method_type: ED25519_VERIFICATION_KEY_2018,
                    multibase: false,
                    key_document: ed25519_document,
                },
                KeyDidMapping {
                    key_type: KeyType::X25519,
                    verification_method_types: &[
                        X25519_KEY_AGREEMENT_KEY_2019,
                        X25519_KEY_AGREEMENT_KEY_2020,
                        JSON_WEB_KEY_2020,
                        MULTIKEY,
                    ],
                    default_method_type: X25519_KEY_AGREEMENT_KEY_2019,
                    multibase: false,
                    key_document: x25519_document,
                },
                KeyDidMapping {
                    key_type: KeyType::Secp256k1,
                    verification_method_types: &[
                        ECDSA_SECP256K1_VERIFICATION_KEY_2019,
                        JSON_WEB_KEY_2020,
                        MULTIKEY,
                    ],
                    default_method_type: ECDSA_SECP256K1_VERIFICATION_KEY_2019,
                    multibase: false,
                    key_document: secp256k1_document,
                },
                KeyDidMapping {
                    key_type: KeyType::P256,
                    verification_method_types: &[JSON_WEB_KEY_2020, MULTIKEY],
                    default_method_type: MULTIKEY,
                    multibase: true,
                    key_document: p256_document,
                },
                KeyDidMapping {
                    key_type: KeyType::Bls12381G2,
                    verification_method_types: &[BLS12381_G2_KEY_2020],
                    default_method_type: BLS12381_G2_KEY_2020,
                    multibase: false,
                    key_document: bls12381g2_document,
                },
            ],
        }
    }

    pub fn supported_key_types(&self) -> Vec<KeyType> {
        self.entries.iter().map(|entry| entry.key_type).collect()
    }

    pub fn for_key_type(&self, key_type: KeyType) -> Result<&KeyDidMapping, DocError> {
        self.entries
            .iter()
            .find(|entry| entry.key_type == key_type)
            .ok_or_else(|| DocError::UnsupportedKeyType(key_type.name().to_string()))
    }

    /// Default verification method for the key, in the encoding its type requires
    pub fn verification_method(
        &self,
        id: String,
        controller: String,
        key: &PublicKey,
    ) -> Result<VerificationMethod, DocError> {
        let mapping = self.for_key_type(key.key_type())?;
        Ok(mapping.build_method(id, controller, key))
    }

    /// The `did:key` style document used by `did:peer:0`
    pub fn key_document(&self, did: &str, key: &PublicKey) -> Result<DidDocument, DocError> {
        let mapping = self.for_key_type(key.key_type())?;
        (mapping.key_document)(did, key)
    }

    pub fn key_from_verification_method(
        &self,
        vm: &VerificationMethod,
    ) -> Result<PublicKey, DocError> {
        let key = match vm.material() {
            KeyMaterial::Base58(encoded) => {
                if SHARED_TYPES.contains(&vm.method_type()) {
                    return Err(DocError::UnsupportedKeyMaterial(format!(
                        "{} with publicKeyBase58",
                        vm.method_type()
                    )));
                }

                let mapping = self
                    .entries
                    .iter()
                    .find(|entry| entry.verification_method_types.contains(&vm.method_type()))
                    .ok_or_else(|| {
                        DocError::UnsupportedVerificationMethod(vm.method_type().to_string())
                    })?;

                PublicKey::from_base58(mapping.key_type, encoded)?
            }
            KeyMaterial::Multibase(encoded) => PublicKey::from_fingerprint(encoded)?,
            KeyMaterial::Jwk(jwk) => key_from_jwk(jwk)?,
            KeyMaterial::Hex(_) => {
                return Err(DocError::UnsupportedKeyMaterial("publicKeyHex".to_string()))
            }
            KeyMaterial::Pem(_) => {
                return Err(DocError::UnsupportedKeyMaterial("publicKeyPem".to_string()))
            }
        };

        let mapping = self.for_key_type(key.key_type())?;
        if !mapping.verification_method_types.contains(&vm.method_type()) {
            return Err(DocError::UnsupportedVerificationMethod(format!(
                "{} for {}",
                vm.method_type(),
                key.key_type().name()
            )));
        }

        Ok(key)
    }
}

impl KeyDidMapping {
    pub fn build_method(&self, id: String, controller: String, key: &PublicKey) -> VerificationMethod {
        let material = if self.multibase {
            KeyMaterial::Multibase(key.fingerprint())
        } else {
            KeyMaterial::Base58(key.to_base58())
        };

        VerificationMethod::new(id, self.default_method_type, controller, material)
    }
}

fn key_from_jwk(jwk: &Value) -> Result<PublicKey, DocError> {
    let field = |name: &str| -> Result<Vec<u8>, DocError> {
        let encoded = jwk
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| DocError::UnsupportedKeyMaterial(format!("jwk without {}", name)))?;

        URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|err| DocError::UnsupportedKeyMaterial(err.to_string()))
    };

    let crv = jwk.get("crv").and_then(Value::as_str).unwrap_or_default();
    match crv {
        "Ed25519" => Ok(PublicKey::new(KeyType::Ed25519, field("x")?)?),
        "X25519" => Ok(PublicKey::new(KeyType::X25519, field("x")?)?),
        "secp256k1" | "P-256" => {
            let x = field("x")?;
            let y = field("y")?;
            let parity = y.last().map(|last| last & 1).unwrap_or_default();

            let mut compressed = vec![0x02 | parity];
            compressed.extend_from_slice(&x);

            let key_type = if crv == "P-256" {
                KeyType::P256
            } else {
                KeyType::Secp256k1
            };

            Ok(PublicKey::new(key_type, compressed)?)
        }
        _ => Err(DocError::UnsupportedKeyMaterial(format!("jwk curve {}", crv))),
    }
}

/// JWK form of an Ed25519 key, used by JWS protected headers
pub fn ed25519_jwk(key: &PublicKey) -> Result<Value, DocError> {
    if key.key_type() != KeyType::Ed25519 {
        return Err(DocError::UnsupportedKeyType(key.key_type().name().to_string()));
    }

    Ok(json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": URL_SAFE_NO_PAD.encode(key.as_bytes()),
    }))
}

fn signature_document(vm: VerificationMethod, context: &str) -> DidDocumentBuilder {
    let id = vm.id().to_string();

    DidDocumentBuilder::new()
        .add_context(context)
        .add_verification_method(vm)
        .add_authentication(id.as_str())
        .add_assertion_method(id.as_str())
        .add_capability_delegation(id.as_str())
        .add_capability_invocation(id.as_str())
}

fn key_url(did: &str, key: &PublicKey) -> String {
    format!("{}#{}", did, key.fingerprint())
}

fn base58_method(method_type: &str, did: &str, key: &PublicKey) -> VerificationMethod {
    VerificationMethod::new(
        key_url(did, key),
        method_type,
        did.to_string(),
        KeyMaterial::Base58(key.to_base58()),
    )
}

fn ed25519_document(did: &str, key: &PublicKey) -> Result<DidDocument, DocError> {
    let vm = base58_method(ED25519_VERIFICATION_KEY_2018, did, key);

    let x25519 = convert_ed25519_to_x25519(key)?;
    let agreement = base58_method(X25519_KEY_AGREEMENT_KEY_2019, did, &x25519);

    let draft = signature_document(vm, ED25519_2018_CONTEXT)
        .add_context(X25519_2019_CONTEXT)
        .add_key_agreement(agreement)
        .build();

    Ok(draft.into_document(did.to_string()))
}

fn x25519_document(did: &str, key: &PublicKey) -> Result<DidDocument, DocError> {
    let agreement = base58_method(X25519_KEY_AGREEMENT_KEY_2019, did, key);

    let draft = DidDocumentBuilder::new()
        .add_context(X25519_2019_CONTEXT)
        .add_key_agreement(agreement)
        .build();

    Ok(draft.into_document(did.to_string()))
}

fn secp256k1_document(did: &str, key: &PublicKey) -> Result<DidDocument, DocError> {
    let vm = base58_method(ECDSA_SECP256K1_VERIFICATION_KEY_2019, did, key);

    Ok(signature_document(vm, SECP256K1_2019_CONTEXT)
        .build()
        .into_document(did.to_string()))
}

fn p256_document(did: &str, key: &PublicKey) -> Result<DidDocument, DocError> {
    let vm = VerificationMethod::new(
        key_url(did, key),
        MULTIKEY,
        did.to_string(),
        KeyMaterial::Multibase(key.fingerprint()),
    );

    Ok(signature_document(vm, MULTIKEY_CONTEXT)
        .build()
        .into_document(did.to_string()))
}

fn bls12381g2_document(did: &str, key: &PublicKey) -> Result<DidDocument, DocError> {
    let vm = base58_method(BLS12381_G2_KEY_2020, did, key);

    Ok(signature_document(vm, BLS12381_2020_CONTEXT)
        .build()
        .into_document(did.to_string()))
}
