use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use crate::identity::doc::DidDocument;
use crate::identity::key::PublicKey;

use super::did_peer::get_alternative_dids;
use super::types::{num_algo_from_did, NumAlgo, PeerDidError};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde", rename_all = "lowercase")]
pub enum DidRole {
    Created,
    Received,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct DidRecordTags {
    pub recipient_key_fingerprints: Vec<String>,
    pub alternative_dids: Vec<String>,
}

/// `DidQuery` filters stored [`DidRecord`], every given field must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DidQuery {
    pub did: Option<String>,
    pub role: Option<DidRole>,
    pub recipient_key_fingerprint: Option<String>,
    pub alternative_did: Option<String>,
}

impl DidQuery {
    pub fn by_did(did: &str) -> Self {
        Self {
            did: Some(did.to_string()),
            ..Default::default()
        }
    }

    pub fn by_alternative_did(did: &str) -> Self {
        Self {
            alternative_did: Some(did.to_string()),
            ..Default::default()
        }
    }

    pub fn by_recipient_key(key: &PublicKey) -> Self {
        Self {
            recipient_key_fingerprint: Some(key.fingerprint()),
            ..Default::default()
        }
    }
}

/// `DidRecord` is a peer did this agent created or received
///
/// The record id is the did itself. The document is kept only for `did:peer:1`, every
/// other numalgo can rebuild its document from the identifier
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde", rename_all = "camelCase")]
pub struct DidRecord {
    id: String,
    role: DidRole,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    did_document: Option<DidDocument>,

    tags: DidRecordTags,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DidRecord {
    pub fn new(
        role: DidRole,
        document: DidDocument,
        recipient_keys: &[PublicKey],
    ) -> Result<Self, PeerDidError> {
        let did = document.id().to_string();
        let did_document = match num_algo_from_did(&did)? {
            NumAlgo::GenesisDoc => Some(document),
            _ => None,
        };

        let now = Utc::now();
        Ok(Self {
            tags: DidRecordTags {
                recipient_key_fingerprints: recipient_keys
                    .iter()
                    .map(PublicKey::fingerprint)
                    .collect(),
                alternative_dids: get_alternative_dids(&did),
            },
            id: did,
            role,
            did_document,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn did(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> DidRole {
        self.role
    }

    pub fn did_document(&self) -> Option<&DidDocument> {
        self.did_document.as_ref()
    }

    pub fn tags(&self) -> &DidRecordTags {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_recipient_keys(&mut self, recipient_keys: &[PublicKey]) {
        self.tags.recipient_key_fingerprints = recipient_keys
            .iter()
            .map(PublicKey::fingerprint)
            .collect();
        self.updated_at = Utc::now();
    }

    pub fn matches(&self, query: &DidQuery) -> bool {
        let did = query.did.as_ref().map_or(true, |did| &self.id == did);
        let role = query.role.map_or(true, |role| self.role == role);
        let recipient = query
            .recipient_key_fingerprint
            .as_ref()
            .map_or(true, |fp| self.tags.recipient_key_fingerprints.contains(fp));
        let alternative = query
            .alternative_did
            .as_ref()
            .map_or(true, |alt| self.tags.alternative_dids.contains(alt));

        did && role && recipient && alternative
    }
}

impl ToJSON for DidRecord {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryInto<Vec<u8>> for DidRecord {
    type Error = PeerDidError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| PeerDidError::JSONError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for DidRecord {
    type Error = PeerDidError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|err| PeerDidError::JSONError(err.to_string()))
    }
}
