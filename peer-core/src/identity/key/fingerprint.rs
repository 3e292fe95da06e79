use curve25519_dalek::edwards::CompressedEdwardsY;

use rst_common::standard::serde::{self, Deserialize, Serialize};

use super::types::{KeyError, KeyType};
use super::varint;

const MULTIBASE_BASE58BTC: char = 'z';
const DID_KEY_PREFIX: &str = "did:key:";

/// `PublicKey` is raw public key material bound to its [`KeyType`]
///
/// It is serialized using its fingerprint, so stored records and messages never carry
/// key bytes without the multicodec that describes them
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(crate = "self::serde", into = "String", try_from = "String")]
pub struct PublicKey {
    key_type: KeyType,
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(key_type: KeyType, bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() != key_type.key_length() {
            return Err(KeyError::InvalidKeyLength(
                key_type.name().to_string(),
                bytes.len(),
            ));
        }

        Ok(Self { key_type, bytes })
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn prefixed_bytes(&self) -> Vec<u8> {
        let mut out = varint::encode(self.key_type.multicodec());
        out.extend_from_slice(&self.bytes);
        out
    }

    /// `fingerprint` builds `z` + base58btc(varint(multicodec) ++ key)
    pub fn fingerprint(&self) -> String {
        format!(
            "{}{}",
            MULTIBASE_BASE58BTC,
            bs58::encode(self.prefixed_bytes()).into_string()
        )
    }

    pub fn from_fingerprint(fingerprint: &str) -> Result<Self, KeyError> {
        let encoded = fingerprint
            .strip_prefix(MULTIBASE_BASE58BTC)
            .ok_or_else(|| KeyError::InvalidFingerprint(fingerprint.to_string()))?;

        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|err| KeyError::InvalidFingerprint(err.to_string()))?;

        Self::from_prefixed_bytes(&decoded)
    }

    pub fn from_prefixed_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let (code, consumed) = varint::decode(bytes)?;
        let key_type = KeyType::from_multicodec(code)?;
        Self::new(key_type, bytes[consumed..].to_vec())
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }

    pub fn from_base58(key_type: KeyType, encoded: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|err| KeyError::InvalidFingerprint(err.to_string()))?;

        Self::new(key_type, bytes)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.fingerprint()
    }
}

impl TryFrom<String> for PublicKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PublicKey::from_fingerprint(&value)
    }
}

/// `convert_ed25519_to_x25519` maps an Ed25519 verification key to the X25519 key
/// agreement key sharing the same secret
pub fn convert_ed25519_to_x25519(key: &PublicKey) -> Result<PublicKey, KeyError> {
    if key.key_type() != KeyType::Ed25519 {
        return Err(KeyError::UnsupportedKeyType(key.key_type().name().to_string()));
    }

    let compressed = CompressedEdwardsY::from_slice(key.as_bytes())
        .map_err(|err| KeyError::ConversionError(err.to_string()))?;

    let point = compressed
        .decompress()
        .ok_or_else(|| KeyError::ConversionError("not a valid edwards point".to_string()))?;

    PublicKey::new(KeyType::X25519, point.to_montgomery().to_bytes().to_vec())
}

/// `DidKey` wraps a [`PublicKey`] to build the `did:key` forms used as key references
/// in routing keys and JWS `kid` headers
#[derive(Debug, Clone, PartialEq)]
pub struct DidKey {
    key: PublicKey,
}

impl DidKey {
    pub fn new(key: PublicKey) -> Self {
        Self { key }
    }

    /// Accepts both `did:key:<fp>` and `did:key:<fp>#<fp>`
    pub fn from_did(did: &str) -> Result<Self, KeyError> {
        let method_specific = did
            .strip_prefix(DID_KEY_PREFIX)
            .ok_or_else(|| KeyError::InvalidDidKey(did.to_string()))?;

        let fingerprint = method_specific
            .split('#')
            .next()
            .ok_or_else(|| KeyError::InvalidDidKey(did.to_string()))?;

        let key = PublicKey::from_fingerprint(fingerprint)?;
        Ok(Self { key })
    }

    pub fn is_did_key(value: &str) -> bool {
        value.starts_with(DID_KEY_PREFIX)
    }

    pub fn did(&self) -> String {
        format!("{}{}", DID_KEY_PREFIX, self.key.fingerprint())
    }

    pub fn key_id(&self) -> String {
        format!("{}#{}", self.did(), self.key.fingerprint())
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }
}
