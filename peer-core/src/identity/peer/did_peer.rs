use crate::identity::doc::{DidDocument, KeyDidMappings};
use crate::identity::key::PublicKey;

use super::types::{num_algo_from_did, NumAlgo, PeerDidError};
use super::{numalgo0, numalgo1, numalgo2, numalgo4};

/// `DidPeer` is a parsed `did:peer` identifier, with the document that was transmitted
/// or stored alongside it when the identifier alone is not enough
///
/// The numalgo is always read back from the identifier string
#[derive(Debug, Clone, PartialEq)]
pub struct DidPeer {
    did: String,
    document: Option<DidDocument>,
}

impl DidPeer {
    pub fn from_did(did: &str) -> Result<Self, PeerDidError> {
        num_algo_from_did(did)?;

        Ok(Self {
            did: did.to_string(),
            document: None,
        })
    }

    pub fn from_key(key: &PublicKey) -> Self {
        Self {
            did: numalgo0::encode(key),
            document: None,
        }
    }

    /// Binds a document to its identifier. A genesis document must hash to the
    /// identifier it claims
    pub fn from_document(document: DidDocument) -> Result<Self, PeerDidError> {
        let did = document.id().to_string();

        if num_algo_from_did(&did)? == NumAlgo::GenesisDoc {
            numalgo1::verify(&did, &document)?;
        }

        Ok(Self {
            did,
            document: Some(document),
        })
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn num_algo(&self) -> Result<NumAlgo, PeerDidError> {
        num_algo_from_did(&self.did)
    }

    pub fn did_document(&self, mappings: &KeyDidMappings) -> Result<DidDocument, PeerDidError> {
        let stored = || {
            self.document
                .clone()
                .ok_or_else(|| PeerDidError::MissingDocument(self.did.clone()))
        };

        match self.num_algo()? {
            NumAlgo::InceptionKeyWithoutDoc => numalgo0::decode(&self.did, mappings),
            NumAlgo::GenesisDoc => stored(),
            NumAlgo::MultipleInceptionKeyWithoutDoc => numalgo2::decode(&self.did, mappings),
            NumAlgo::ShortFormAndLongForm if numalgo4::is_long_form(&self.did) => {
                numalgo4::decode(&self.did)
            }
            NumAlgo::ShortFormAndLongForm => stored(),
        }
    }
}

/// Other identifiers the same document is known by, the short form of a long form
/// `did:peer:4`. Anything else has no alternative
pub fn get_alternative_dids(did: &str) -> Vec<String> {
    if numalgo4::is_long_form(did) {
        if let Ok(short) = numalgo4::short_form(did) {
            return vec![short];
        }
    }

    Vec::new()
}
