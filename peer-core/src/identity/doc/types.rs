use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::Value;
use rst_common::with_errors::thiserror::{self, Error};

use crate::identity::key::KeyError;

pub const DID_V1_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
pub const ED25519_2018_CONTEXT: &str = "https://w3id.org/security/suites/ed25519-2018/v1";
pub const X25519_2019_CONTEXT: &str = "https://w3id.org/security/suites/x25519-2019/v1";
pub const SECP256K1_2019_CONTEXT: &str = "https://w3id.org/security/suites/secp256k1-2019/v1";
pub const MULTIKEY_CONTEXT: &str = "https://w3id.org/security/multikey/v1";
pub const BLS12381_2020_CONTEXT: &str = "https://w3id.org/security/bbs/v1";

pub const ED25519_VERIFICATION_KEY_2018: &str = "Ed25519VerificationKey2018";
pub const ED25519_VERIFICATION_KEY_2020: &str = "Ed25519VerificationKey2020";
pub const X25519_KEY_AGREEMENT_KEY_2019: &str = "X25519KeyAgreementKey2019";
pub const X25519_KEY_AGREEMENT_KEY_2020: &str = "X25519KeyAgreementKey2020";
pub const ECDSA_SECP256K1_VERIFICATION_KEY_2019: &str = "EcdsaSecp256k1VerificationKey2019";
pub const BLS12381_G2_KEY_2020: &str = "Bls12381G2Key2020";
pub const JSON_WEB_KEY_2020: &str = "JsonWebKey2020";
pub const MULTIKEY: &str = "Multikey";

/// `DocError` covers the document model, its builder and the key mappings
#[derive(Debug, PartialEq, Error, Clone)]
pub enum DocError {
    #[error("unable to dereference verification method: {0}")]
    DereferenceError(String),

    #[error("unsupported verification method type: {0}")]
    UnsupportedVerificationMethod(String),

    #[error("unsupported key material: {0}")]
    UnsupportedKeyMaterial(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("invalid service: {0}")]
    InvalidService(String),

    #[error("key error: {0}")]
    KeyError(#[from] KeyError),

    #[error("json error: {0}")]
    JSONError(String),
}

/// `OneOrMany` accepts both a single value and a list of values, the way DID documents
/// spell `controller`, `@context` and DIDComm v2 endpoints
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }

    pub fn to_vec(&self) -> Vec<&T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values.iter().collect(),
        }
    }
}

/// `KeyMaterial` holds exactly one public key encoding of a verification method
///
/// Which variant is used is decided by the verification method type through the
/// [`super::KeyDidMappings`] table, callers never pick it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub enum KeyMaterial {
    #[serde(rename = "publicKeyBase58")]
    Base58(String),

    #[serde(rename = "publicKeyMultibase")]
    Multibase(String),

    #[serde(rename = "publicKeyJwk")]
    Jwk(Value),

    #[serde(rename = "publicKeyHex")]
    Hex(String),

    #[serde(rename = "publicKeyPem")]
    Pem(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct VerificationMethod {
    id: String,

    #[serde(rename = "type")]
    method_type: String,

    controller: String,

    #[serde(flatten)]
    material: KeyMaterial,
}

impl VerificationMethod {
    pub fn new(id: String, method_type: &str, controller: String, material: KeyMaterial) -> Self {
        Self {
            id,
            method_type: method_type.to_string(),
            controller,
            material,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method_type(&self) -> &str {
        &self.method_type
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub fn with_controller(mut self, controller: String) -> Self {
        self.controller = controller;
        self
    }

    /// Checks whether the given reference points to this method, by full id or by
    /// its `#fragment`
    pub fn matches(&self, reference: &str) -> bool {
        if self.id == reference {
            return true;
        }

        match fragment(reference) {
            Some(frag) => self.id.ends_with(frag),
            None => false,
        }
    }
}

/// Returns the `#fragment` part of a DID URL, including the `#`
pub fn fragment(reference: &str) -> Option<&str> {
    reference.find('#').map(|idx| &reference[idx..])
}

/// `VerificationEntry` is one entry of a verification relationship, either a
/// reference to a method id or an embedded method
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", untagged)]
pub enum VerificationEntry {
    Reference(String),
    Embedded(VerificationMethod),
}

impl From<&str> for VerificationEntry {
    fn from(value: &str) -> Self {
        VerificationEntry::Reference(value.to_string())
    }
}

impl From<String> for VerificationEntry {
    fn from(value: String) -> Self {
        VerificationEntry::Reference(value)
    }
}

impl From<VerificationMethod> for VerificationEntry {
    fn from(value: VerificationMethod) -> Self {
        VerificationEntry::Embedded(value)
    }
}

/// `Purpose` names the five verification relationships of a document
///
/// The single letter prefix is the purpose code used by `did:peer:2`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(crate = "self::serde")]
pub enum Purpose {
    Assertion,
    Encryption,
    Verification,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl Purpose {
    pub const ALL: [Purpose; 5] = [
        Purpose::Assertion,
        Purpose::Encryption,
        Purpose::Verification,
        Purpose::CapabilityInvocation,
        Purpose::CapabilityDelegation,
    ];

    pub fn prefix(&self) -> char {
        match self {
            Purpose::Assertion => 'A',
            Purpose::Encryption => 'E',
            Purpose::Verification => 'V',
            Purpose::CapabilityInvocation => 'I',
            Purpose::CapabilityDelegation => 'D',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Purpose> {
        Purpose::ALL
            .into_iter()
            .find(|purpose| purpose.prefix() == prefix)
    }

    /// Property name of the relationship inside a document
    pub fn property(&self) -> &'static str {
        match self {
            Purpose::Assertion => "assertionMethod",
            Purpose::Encryption => "keyAgreement",
            Purpose::Verification => "authentication",
            Purpose::CapabilityInvocation => "capabilityInvocation",
            Purpose::CapabilityDelegation => "capabilityDelegation",
        }
    }
}
