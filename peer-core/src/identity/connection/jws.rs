use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use rst_common::standard::serde_json::{self, json, Value};

use crate::identity::doc::mapping::ed25519_jwk;
use crate::identity::doc::DidDocument;
use crate::identity::key::{DidKey, KeyType, PublicKey};

use super::messages::{decode_base64, Attachment, AttachmentData, Jws, JwsHeader, JwsSignature, DID_DOC_MIME_TYPE};
use super::types::{ConnectionError, KeyManagementBuilder};

const JWS_ALGORITHM: &str = "EdDSA";

/// What a signed attachment carries, a whole document or only a did
#[derive(Debug, Clone, Copy)]
pub enum SignedData<'a> {
    Document(&'a DidDocument),
    Did(&'a str),
}

/// Result of checking every signature of an attachment
///
/// `is_valid` is true only when there is at least one signature and all of them verify
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAttachment {
    pub payload: Vec<u8>,
    pub signers: Vec<PublicKey>,
    pub is_valid: bool,
}

fn protected_header(key: &PublicKey) -> Result<String, ConnectionError> {
    let header = json!({
        "alg": JWS_ALGORITHM,
        "jwk": ed25519_jwk(key)?,
    });

    let bytes = serde_json::to_vec(&header).map_err(|err| ConnectionError::JSONError(err.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Builds an attachment with one detached JWS per key, signed through the key manager
pub async fn create_signed_attachment<TKms>(
    kms: &TKms,
    data: SignedData<'_>,
    keys: &[PublicKey],
) -> Result<Attachment, ConnectionError>
where
    TKms: KeyManagementBuilder,
{
    if keys.is_empty() {
        return Err(ConnectionError::KmsError("no key to sign the attachment".to_string()));
    }

    let (bytes, mime_type, encoded) = match data {
        SignedData::Document(document) => {
            let bytes = document.to_vec()?;
            let encoded = STANDARD.encode(&bytes);
            (bytes, Some(DID_DOC_MIME_TYPE), encoded)
        }
        SignedData::Did(did) => (did.as_bytes().to_vec(), None, URL_SAFE_NO_PAD.encode(did)),
    };

    let payload = URL_SAFE_NO_PAD.encode(&bytes);
    let mut signatures = Vec::new();

    for key in keys {
        let protected = protected_header(key)?;
        let signing_input = format!("{}.{}", protected, payload);
        let signature = kms.sign(key.fingerprint(), signing_input.into_bytes()).await?;

        signatures.push(JwsSignature {
            header: JwsHeader {
                kid: DidKey::new(key.clone()).did(),
            },
            protected,
            signature: URL_SAFE_NO_PAD.encode(signature),
        });
    }

    Ok(Attachment::new(
        mime_type,
        AttachmentData {
            base64: Some(encoded),
            jws: Some(Jws::from_signatures(signatures)),
        },
    ))
}

fn signer_key(signature: &JwsSignature) -> Result<PublicKey, ConnectionError> {
    let signer = DidKey::from_did(&signature.header.kid)
        .map_err(|err| ConnectionError::InvalidMessage(format!("jws kid: {}", err)))?
        .key()
        .to_owned();

    if signer.key_type() != KeyType::Ed25519 {
        return Err(ConnectionError::InvalidMessage(format!(
            "jws signer must be Ed25519: {}",
            signature.header.kid
        )));
    }

    let header: Value = serde_json::from_slice(&decode_base64(&signature.protected)?)
        .map_err(|err| ConnectionError::JSONError(err.to_string()))?;

    if header.get("alg").and_then(Value::as_str) != Some(JWS_ALGORITHM) {
        return Err(ConnectionError::InvalidMessage(format!(
            "unsupported jws algorithm: {}",
            header.get("alg").unwrap_or(&Value::Null)
        )));
    }

    if let Some(jwk) = header.get("jwk") {
        if jwk != &ed25519_jwk(&signer)? {
            return Err(ConnectionError::InvalidMessage(
                "jws jwk does not match its kid".to_string(),
            ));
        }
    }

    Ok(signer)
}

/// Checks every detached JWS of the attachment against its payload
///
/// A malformed signature fails the whole call, a signature that is well formed but
/// does not verify only marks the result as invalid
pub async fn verify_signed_attachment<TKms>(
    kms: &TKms,
    attachment: &Attachment,
) -> Result<VerifiedAttachment, ConnectionError>
where
    TKms: KeyManagementBuilder,
{
    let payload = attachment.payload()?;
    let jws = attachment
        .data
        .jws
        .as_ref()
        .ok_or_else(|| ConnectionError::MissingField("attachment jws".to_string()))?;

    let encoded_payload = URL_SAFE_NO_PAD.encode(&payload);
    let signatures = jws.signatures();

    let mut signers = Vec::new();
    let mut is_valid = !signatures.is_empty();

    for signature in signatures {
        let signer = signer_key(signature)?;
        let signing_input = format!("{}.{}", signature.protected, encoded_payload);
        let raw_signature = decode_base64(&signature.signature)?;

        let verified = kms
            .verify(signer.clone(), signing_input.into_bytes(), raw_signature)
            .await?;

        is_valid = is_valid && verified;
        if !signers.contains(&signer) {
            signers.push(signer);
        }
    }

    Ok(VerifiedAttachment {
        payload,
        signers,
        is_valid,
    })
}
