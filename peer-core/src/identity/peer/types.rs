use once_cell::sync::Lazy;
use regex::Regex;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

use crate::identity::doc::DocError;
use crate::identity::key::KeyError;

use super::record::{DidQuery, DidRecord};

pub const PEER_DID_PREFIX: &str = "did:peer:";

static PEER_DID_GRAMMAR: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(concat!(
        r"^did:peer:(",
        r"([01]z[1-9A-HJ-NP-Za-km-z]{5,200})",
        r"|(2(\.[AEVID]z[1-9A-HJ-NP-Za-km-z]{5,200})+(\.S[0-9A-Za-z=_-]*)*)",
        r"|(4z[1-9A-HJ-NP-Za-km-z]{46}(:z[1-9A-HJ-NP-Za-km-z]{6,})?)",
        r")$"
    ))
});

/// `PeerDidError` contains every failure of the `did:peer` codecs, the registrar and the resolver
#[derive(Debug, PartialEq, Error, Clone)]
pub enum PeerDidError {
    #[error("invalid peer did: {0}")]
    InvalidGrammar(String),

    #[error("unsupported numalgo: {0}")]
    UnsupportedNumAlgo(String),

    #[error("invalid key reference: {0}")]
    InvalidKeyReference(String),

    #[error("invalid service: {0}")]
    InvalidService(String),

    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    #[error("missing did document: {0}")]
    MissingDocument(String),

    #[error("did not found: {0}")]
    NotFound(String),

    #[error("repository error: {0}")]
    RepoError(String),

    #[error("json error: {0}")]
    JSONError(String),

    #[error("document error: {0}")]
    DocError(#[from] DocError),

    #[error("key error: {0}")]
    KeyError(#[from] KeyError),
}

/// `NumAlgo` selects one of the four peer did algorithms
///
/// It is never stored, it is always derived from the digit following `did:peer:`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(crate = "self::serde")]
pub enum NumAlgo {
    InceptionKeyWithoutDoc,
    GenesisDoc,
    MultipleInceptionKeyWithoutDoc,
    ShortFormAndLongForm,
}

impl NumAlgo {
    pub fn digit(&self) -> u8 {
        match self {
            NumAlgo::InceptionKeyWithoutDoc => 0,
            NumAlgo::GenesisDoc => 1,
            NumAlgo::MultipleInceptionKeyWithoutDoc => 2,
            NumAlgo::ShortFormAndLongForm => 4,
        }
    }

    pub fn from_digit(digit: u8) -> Result<Self, PeerDidError> {
        match digit {
            0 => Ok(NumAlgo::InceptionKeyWithoutDoc),
            1 => Ok(NumAlgo::GenesisDoc),
            2 => Ok(NumAlgo::MultipleInceptionKeyWithoutDoc),
            4 => Ok(NumAlgo::ShortFormAndLongForm),
            _ => Err(PeerDidError::UnsupportedNumAlgo(digit.to_string())),
        }
    }
}

pub fn is_valid_peer_did(did: &str) -> bool {
    match PEER_DID_GRAMMAR.as_ref() {
        Ok(grammar) => grammar.is_match(did),
        Err(_) => false,
    }
}

/// Fails unless `did` matches the full peer did grammar
pub fn assert_peer_did(did: &str) -> Result<(), PeerDidError> {
    if !is_valid_peer_did(did) {
        return Err(PeerDidError::InvalidGrammar(did.to_string()));
    }

    Ok(())
}

/// Validates the grammar first, then reads the numalgo digit
pub fn num_algo_from_did(did: &str) -> Result<NumAlgo, PeerDidError> {
    assert_peer_did(did)?;

    let digit = did
        .as_bytes()
        .get(PEER_DID_PREFIX.len())
        .map(|byte| byte.wrapping_sub(b'0'))
        .ok_or_else(|| PeerDidError::InvalidGrammar(did.to_string()))?;

    NumAlgo::from_digit(digit)
}

/// Same as [`num_algo_from_did`] and additionally requires the given algorithm
pub fn assert_num_algo(did: &str, expected: NumAlgo) -> Result<(), PeerDidError> {
    let num_algo = num_algo_from_did(did)?;
    if num_algo != expected {
        return Err(PeerDidError::UnsupportedNumAlgo(format!(
            "expected {} got {}",
            expected.digit(),
            num_algo.digit()
        )));
    }

    Ok(())
}

/// `DidRepoBuilder` is the storage of [`DidRecord`], implemented outside of this crate
#[async_trait]
pub trait DidRepoBuilder: Send + Sync {
    async fn save_did_record(&self, record: &DidRecord) -> Result<(), PeerDidError>;
    async fn update_did_record(&self, record: &DidRecord) -> Result<(), PeerDidError>;
    async fn get_did_record_by_id(&self, id: String) -> Result<DidRecord, PeerDidError>;
    async fn find_did_records(&self, query: DidQuery) -> Result<Vec<DidRecord>, PeerDidError>;
}
