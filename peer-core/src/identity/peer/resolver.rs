use rst_common::with_logging::log::{debug, info};

use crate::identity::doc::{DidDocument, DocumentAccessor, DraftDocument, KeyDidMappings};

use super::did_peer::DidPeer;
use super::record::{DidQuery, DidRecord, DidRole};
use super::types::{num_algo_from_did, DidRepoBuilder, NumAlgo, PeerDidError};
use super::{numalgo1, numalgo2, numalgo4};

/// `PeerDidResolver` turns any `did:peer` identifier into its document
///
/// Identifiers that carry their document are decoded directly. A `did:peer:1`, or
/// the short form of a `did:peer:4`, needs the record stored when the did was created
/// or received
pub struct PeerDidResolver<'a, TRepo>
where
    TRepo: DidRepoBuilder,
{
    repo: &'a TRepo,
    mappings: &'a KeyDidMappings,
}

impl<'a, TRepo> PeerDidResolver<'a, TRepo>
where
    TRepo: DidRepoBuilder,
{
    pub fn new(repo: &'a TRepo, mappings: &'a KeyDidMappings) -> Self {
        Self { repo, mappings }
    }

    pub async fn resolve(&self, did: &str) -> Result<DidDocument, PeerDidError> {
        let peer = DidPeer::from_did(did)?;
        debug!("Resolving peer did: {}", did);

        match peer.num_algo()? {
            NumAlgo::GenesisDoc => {
                let record = self.find_record(did).await?;
                record
                    .did_document()
                    .cloned()
                    .ok_or_else(|| PeerDidError::MissingDocument(did.to_string()))
            }
            NumAlgo::ShortFormAndLongForm if !numalgo4::is_long_form(did) => {
                let record = self.find_record(did).await?;
                numalgo4::decode(record.did())
            }
            _ => peer.did_document(self.mappings),
        }
    }

    /// Looks a record up by its did first, then by alternative did
    pub async fn find_record(&self, did: &str) -> Result<DidRecord, PeerDidError> {
        let by_did = self.repo.find_did_records(DidQuery::by_did(did)).await?;
        if let Some(record) = by_did.into_iter().next() {
            return Ok(record);
        }

        self.repo
            .find_did_records(DidQuery::by_alternative_did(did))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PeerDidError::NotFound(did.to_string()))
    }
}

/// `PeerDidRegistrar` mints peer dids from draft documents and stores their records
pub struct PeerDidRegistrar<'a, TRepo>
where
    TRepo: DidRepoBuilder,
{
    repo: &'a TRepo,
    mappings: &'a KeyDidMappings,
}

impl<'a, TRepo> PeerDidRegistrar<'a, TRepo>
where
    TRepo: DidRepoBuilder,
{
    pub fn new(repo: &'a TRepo, mappings: &'a KeyDidMappings) -> Self {
        Self { repo, mappings }
    }

    /// Computes the identifier of `draft` with the given numalgo and saves a
    /// [`DidRole::Created`] record. A `did:peer:4` is stored by its long form
    pub async fn create(
        &self,
        draft: DraftDocument,
        num_algo: NumAlgo,
    ) -> Result<DidDocument, PeerDidError> {
        let document = self.prepare(draft, num_algo)?;
        self.store_created(document.clone()).await?;

        Ok(document)
    }

    /// Computes the final document of `draft` without touching the repository
    pub fn prepare(
        &self,
        draft: DraftDocument,
        num_algo: NumAlgo,
    ) -> Result<DidDocument, PeerDidError> {
        let document = match num_algo {
            NumAlgo::GenesisDoc => numalgo1::finalize(draft)?,
            NumAlgo::MultipleInceptionKeyWithoutDoc => {
                let did = numalgo2::encode(&draft, self.mappings)?;
                numalgo2::decode(&did, self.mappings)?
            }
            NumAlgo::ShortFormAndLongForm => {
                let dids = numalgo4::encode(&draft)?;
                numalgo4::decode(&dids.long_form)?
            }
            NumAlgo::InceptionKeyWithoutDoc => {
                return Err(PeerDidError::UnsupportedNumAlgo(
                    "numalgo 0 is created from a key, not a document".to_string(),
                ))
            }
        };

        Ok(document)
    }

    /// Saves a document returned by [`PeerDidRegistrar::prepare`] as a [`DidRole::Created`] record
    pub async fn store_created(&self, document: DidDocument) -> Result<DidRecord, PeerDidError> {
        self.store(DidRole::Created, document).await
    }

    /// Saves the record of a document received from another party
    ///
    /// A did received again keeps its record, only its recipient keys are refreshed
    pub async fn store_received(&self, document: DidDocument) -> Result<DidRecord, PeerDidError> {
        let existing = self
            .repo
            .find_did_records(DidQuery::by_did(document.id()))
            .await?
            .into_iter()
            .next();

        match existing {
            Some(mut record) => {
                let recipient_keys = document.recipient_keys(self.mappings)?;
                record.set_recipient_keys(&recipient_keys);

                self.repo.update_did_record(&record).await?;
                info!("Updated DID record: {}", record.did());

                Ok(record)
            }
            None => self.store(DidRole::Received, document).await,
        }
    }

    async fn store(&self, role: DidRole, document: DidDocument) -> Result<DidRecord, PeerDidError> {
        num_algo_from_did(document.id())?;

        let recipient_keys = document.recipient_keys(self.mappings)?;
        let record = DidRecord::new(role, document, &recipient_keys)?;

        self.repo.save_did_record(&record).await?;
        info!("Saved DID record: {}", record.did());

        Ok(record)
    }
}
