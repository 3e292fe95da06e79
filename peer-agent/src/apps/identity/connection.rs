use std::convert::TryInto;

use rst_common::standard::async_trait::async_trait;
use rstdev_storage::engine::rocksdb::executor::Executor;

use prople_peer_core::identity::connection::{
    ConnectionError, ConnectionQuery, ConnectionRecord, ConnectionRepoBuilder,
};

use crate::apps::DbCollection;

const CONNECTION_KEY: &str = "connection";

#[derive(Clone)]
pub struct Repository {
    collection: DbCollection,
}

impl Repository {
    pub fn new(db: Executor) -> Self {
        Self {
            collection: DbCollection::new(db, CONNECTION_KEY),
        }
    }

    async fn get_bytes(&self, id: &str) -> Result<Option<Vec<u8>>, ConnectionError> {
        self.collection
            .get(id)
            .await
            .map_err(|err| ConnectionError::RepoError(err.to_string()))
    }
}

#[async_trait]
impl ConnectionRepoBuilder for Repository {
    async fn save_connection(&self, record: &ConnectionRecord) -> Result<(), ConnectionError> {
        let record_bytes: Vec<u8> = record.to_owned().try_into()?;

        self.collection
            .save(record.id(), record_bytes)
            .await
            .map_err(|err| ConnectionError::RepoError(err.to_string()))
    }

    async fn update_connection(&self, record: &ConnectionRecord) -> Result<(), ConnectionError> {
        if self.get_bytes(record.id()).await?.is_none() {
            return Err(ConnectionError::RepoError(format!(
                "connection not found: {}",
                record.id()
            )));
        }

        self.save_connection(record).await
    }

    async fn get_connection_by_id(&self, id: String) -> Result<ConnectionRecord, ConnectionError> {
        let bytes = self
            .get_bytes(&id)
            .await?
            .ok_or_else(|| ConnectionError::RepoError(format!("connection not found: {}", id)))?;

        ConnectionRecord::try_from(bytes)
    }

    async fn find_connections(
        &self,
        query: ConnectionQuery,
    ) -> Result<Vec<ConnectionRecord>, ConnectionError> {
        let values = self
            .collection
            .list()
            .await
            .map_err(|err| ConnectionError::RepoError(err.to_string()))?;

        let mut records = Vec::new();
        for value in values {
            let record = ConnectionRecord::try_from(value)?;
            if record.matches(&query) {
                records.push(record);
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::with_tokio::tokio;

    use prople_peer_core::identity::connection::{DidExchangeState, Role};

    use crate::common::helpers::testdb;

    #[tokio::test]
    async fn test_save_update_find() {
        let (_dir, db) = testdb::temp_db();
        let repo = Repository::new(db);
        let mut record =
            ConnectionRecord::new(Role::Requester, DidExchangeState::InvitationReceived, "oob-1")
                .with_thread_id("thread-1");

        assert!(repo.update_connection(&record).await.is_err());
        repo.save_connection(&record).await.unwrap();

        record.set_state(DidExchangeState::RequestSent).unwrap();
        repo.update_connection(&record).await.unwrap();

        let stored = repo
            .get_connection_by_id(record.id().to_string())
            .await
            .unwrap();
        assert_eq!(stored.state(), DidExchangeState::RequestSent);

        let other = ConnectionRecord::new(Role::Responder, DidExchangeState::RequestReceived, "oob-2")
            .with_thread_id("thread-2");
        repo.save_connection(&other).await.unwrap();

        let found = repo
            .find_connections(ConnectionQuery::by_thread_id("thread-1"))
            .await
            .unwrap();
        assert_eq!(found, vec![record]);

        let by_oob = repo
            .find_connections(ConnectionQuery::by_out_of_band_id("oob-2"))
            .await
            .unwrap();
        assert_eq!(by_oob.len(), 1);
        assert_eq!(by_oob[0].role(), Role::Responder);

        let all = repo
            .find_connections(ConnectionQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_connection() {
        let (_dir, db) = testdb::temp_db();
        let repo = Repository::new(db);
        assert!(matches!(
            repo.get_connection_by_id("missing".to_string()).await.unwrap_err(),
            ConnectionError::RepoError(_)
        ));
    }

    #[tokio::test]
    async fn test_reopened_database() {
        let (dir, db) = testdb::temp_db();
        let record =
            ConnectionRecord::new(Role::Responder, DidExchangeState::RequestReceived, "oob-1")
                .with_thread_id("thread-1");

        Repository::new(db).save_connection(&record).await.unwrap();

        let repo = Repository::new(testdb::open_db(dir.path()));
        let found = repo
            .find_connections(ConnectionQuery::by_thread_id("thread-1"))
            .await
            .unwrap();
        assert_eq!(found, vec![record]);
    }
}
