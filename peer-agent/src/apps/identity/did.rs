use std::convert::TryInto;

use rst_common::standard::async_trait::async_trait;
use rstdev_storage::engine::rocksdb::executor::Executor;

use prople_peer_core::identity::peer::{DidQuery, DidRecord, DidRepoBuilder, PeerDidError};

use crate::apps::DbCollection;

const DID_RECORD_KEY: &str = "did_record";

#[derive(Clone)]
pub struct Repository {
    collection: DbCollection,
}

impl Repository {
    pub fn new(db: Executor) -> Self {
        Self {
            collection: DbCollection::new(db, DID_RECORD_KEY),
        }
    }

    async fn get_bytes(&self, id: &str) -> Result<Option<Vec<u8>>, PeerDidError> {
        self.collection
            .get(id)
            .await
            .map_err(|err| PeerDidError::RepoError(err.to_string()))
    }
}

#[async_trait]
impl DidRepoBuilder for Repository {
    async fn save_did_record(&self, record: &DidRecord) -> Result<(), PeerDidError> {
        let record_bytes: Vec<u8> = record.to_owned().try_into()?;

        self.collection
            .save(record.id(), record_bytes)
            .await
            .map_err(|err| PeerDidError::RepoError(err.to_string()))
    }

    async fn update_did_record(&self, record: &DidRecord) -> Result<(), PeerDidError> {
        if self.get_bytes(record.id()).await?.is_none() {
            return Err(PeerDidError::NotFound(record.id().to_string()));
        }

        self.save_did_record(record).await
    }

    async fn get_did_record_by_id(&self, id: String) -> Result<DidRecord, PeerDidError> {
        let bytes = self
            .get_bytes(&id)
            .await?
            .ok_or_else(|| PeerDidError::NotFound(id.clone()))?;

        DidRecord::try_from(bytes)
    }

    async fn find_did_records(&self, query: DidQuery) -> Result<Vec<DidRecord>, PeerDidError> {
        let values = self
            .collection
            .list()
            .await
            .map_err(|err| PeerDidError::RepoError(err.to_string()))?;

        let mut records = Vec::new();
        for value in values {
            let record = DidRecord::try_from(value)?;
            if record.matches(&query) {
                records.push(record);
            }
        }

        Ok(records)
    }
}
