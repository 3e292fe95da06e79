use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

/// `KeyError` contains all possible errors when handling public keys and fingerprints
#[derive(Debug, PartialEq, Error, Clone)]
pub enum KeyError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("unsupported multicodec prefix: {0:#x}")]
    UnsupportedMulticodec(u16),

    #[error("invalid varint: {0}")]
    InvalidVarint(String),

    #[error("invalid key length for {0}: {1}")]
    InvalidKeyLength(String, usize),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("invalid did:key: {0}")]
    InvalidDidKey(String),

    #[error("key conversion error: {0}")]
    ConversionError(String),
}

/// `KeyType` is the closed set of key types this crate knows how to fingerprint
///
/// Each key type is bound to a single multicodec value. Anything outside of this
/// set is rejected when parsing a fingerprint, it will never be passed through
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(crate = "self::serde")]
pub enum KeyType {
    Ed25519,
    X25519,
    Secp256k1,
    P256,
    Bls12381G2,
}

impl KeyType {
    pub const ALL: [KeyType; 5] = [
        KeyType::Ed25519,
        KeyType::X25519,
        KeyType::Secp256k1,
        KeyType::P256,
        KeyType::Bls12381G2,
    ];

    pub fn multicodec(&self) -> u16 {
        match self {
            KeyType::Ed25519 => 0xed,
            KeyType::X25519 => 0xec,
            KeyType::Secp256k1 => 0xe7,
            KeyType::P256 => 0x1200,
            KeyType::Bls12381G2 => 0xeb,
        }
    }

    pub fn from_multicodec(code: u16) -> Result<Self, KeyError> {
        KeyType::ALL
            .into_iter()
            .find(|key_type| key_type.multicodec() == code)
            .ok_or(KeyError::UnsupportedMulticodec(code))
    }

    /// Expected raw public key length in bytes, compressed form for the EC curves
    pub fn key_length(&self) -> usize {
        match self {
            KeyType::Ed25519 | KeyType::X25519 => 32,
            KeyType::Secp256k1 | KeyType::P256 => 33,
            KeyType::Bls12381G2 => 96,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::X25519 => "x25519",
            KeyType::Secp256k1 => "secp256k1",
            KeyType::P256 => "p256",
            KeyType::Bls12381G2 => "bls12381g2",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use table_test::table_test;

    #[test]
    fn test_multicodec_lookup() {
        let table = vec![
            (0xed, KeyType::Ed25519),
            (0xec, KeyType::X25519),
            (0xe7, KeyType::Secp256k1),
            (0x1200, KeyType::P256),
            (0xeb, KeyType::Bls12381G2),
        ];

        for (validator, input, expected) in table_test!(table) {
            let key_type = KeyType::from_multicodec(input);
            assert!(!key_type.is_err());

            validator
                .given(&format!("{:#x}", input))
                .when("lookup key type")
                .then("known key type")
                .assert_eq(expected, key_type.unwrap());
        }
    }

    #[test]
    fn test_unknown_multicodec() {
        let key_type = KeyType::from_multicodec(0x55);
        assert!(key_type.is_err());
        assert!(matches!(
            key_type.unwrap_err(),
            KeyError::UnsupportedMulticodec(0x55)
        ))
    }
}
