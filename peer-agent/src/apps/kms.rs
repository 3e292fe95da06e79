use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;
use rst_common::with_tokio::tokio::sync::RwLock;

use prople_peer_core::identity::connection::{ConnectionError, KeyHandle, KeyManagementBuilder};
use prople_peer_core::identity::key::{convert_ed25519_to_x25519, KeyType, PublicKey};

/// `Ed25519Kms` keeps Ed25519 signing keys in memory, indexed by their fingerprint
///
/// Clones share the same key set
#[derive(Clone, Default)]
pub struct Ed25519Kms {
    keys: Arc<RwLock<HashMap<String, SigningKey>>>,
}

impl Ed25519Kms {
    pub fn new() -> Self {
        Self::default()
    }

    fn verifying_key(key: &PublicKey) -> Result<VerifyingKey, ConnectionError> {
        if key.key_type() != KeyType::Ed25519 {
            return Err(ConnectionError::KmsError(format!(
                "unsupported key type: {}",
                key.key_type().name()
            )));
        }

        let bytes: [u8; 32] = key
            .as_bytes()
            .try_into()
            .map_err(|_| ConnectionError::KmsError("invalid key length".to_string()))?;

        VerifyingKey::from_bytes(&bytes).map_err(|err| ConnectionError::KmsError(err.to_string()))
    }
}

#[async_trait]
impl KeyManagementBuilder for Ed25519Kms {
    async fn create_key(&self, key_type: KeyType) -> Result<KeyHandle, ConnectionError> {
        if key_type != KeyType::Ed25519 {
            return Err(ConnectionError::KmsError(format!(
                "unsupported key type: {}",
                key_type.name()
            )));
        }

        let signing = SigningKey::generate(&mut OsRng);
        let public_key = PublicKey::new(KeyType::Ed25519, signing.verifying_key().to_bytes().to_vec())?;
        let handle = KeyHandle::new(public_key);

        debug!("kms: new key {}", handle.key_id);
        self.keys
            .write()
            .await
            .insert(handle.key_id.clone(), signing);

        Ok(handle)
    }

    async fn sign(&self, key_id: String, data: Vec<u8>) -> Result<Vec<u8>, ConnectionError> {
        let keys = self.keys.read().await;
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
        let verifying = Self::verifying_key(&key)?;

        match Signature::from_slice(&signature) {
            Ok(signature) => Ok(verifying.verify(&data, &signature).is_ok()),
            Err(_) => Ok(false),
        }
    }

    async fn convert_ed25519_to_x25519(&self, key: PublicKey) -> Result<PublicKey, ConnectionError> {
        Ok(convert_ed25519_to_x25519(&key)?)
    }
}
