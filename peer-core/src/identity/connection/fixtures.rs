use std::collections::HashMap;
use std::sync::Mutex;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use rst_common::standard::async_trait::async_trait;

use crate::identity::key::{convert_ed25519_to_x25519, KeyType, PublicKey};

use super::types::{ConnectionError, KeyHandle, KeyManagementBuilder};

/// Ed25519 only key manager holding its secrets in memory
#[derive(Default)]
pub struct FakeKms {
    keys: Mutex<HashMap<String, SigningKey>>,
}

impl FakeKms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> PublicKey {
        let signing = SigningKey::generate(&mut OsRng);
        let public_key = PublicKey::new(KeyType::Ed25519, signing.verifying_key().to_bytes().to_vec())
            .unwrap();

        self.keys
            .lock()
            .unwrap()
            .insert(public_key.fingerprint(), signing);

        public_key
    }
}

#[async_trait]
impl KeyManagementBuilder for FakeKms {
    async fn create_key(&self, key_type: KeyType) -> Result<KeyHandle, ConnectionError> {
        if key_type != KeyType::Ed25519 {
            return Err(ConnectionError::KmsError(key_type.name().to_string()));
        }

        Ok(KeyHandle::new(self.generate()))
    }

    async fn sign(&self, key_id: String, data: Vec<u8>) -> Result<Vec<u8>, ConnectionError> {
        let keys = self.keys.lock().unwrap();
        let signing = keys
            .get(&key_id)
            .ok_or_else(|| ConnectionError::KmsError(format!("unknown key: {}", key_id)))?;

        Ok(signing.sign(&data).to_bytes().to_vec())
    }

    async fn verify(
        &self,
        key: PublicKey,
        data: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<bool, ConnectionError> {
        let bytes: [u8; 32] = key
            .as_bytes()
            .try_into()
            .map_err(|_| ConnectionError::KmsError("invalid key length".to_string()))?;
        let verifying = VerifyingKey::from_bytes(&bytes)
            .map_err(|err| ConnectionError::KmsError(err.to_string()))?;

        match Signature::from_slice(&signature) {
            Ok(signature) => Ok(verifying.verify(&data, &signature).is_ok()),
            Err(_) => Ok(false),
        }
    }

    async fn convert_ed25519_to_x25519(&self, key: PublicKey) -> Result<PublicKey, ConnectionError> {
        Ok(convert_ed25519_to_x25519(&key)?)
    }
}
