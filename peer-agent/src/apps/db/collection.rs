use rstdev_storage::engine::rocksdb::executor::Executor;
use rstdev_storage::engine::rocksdb::types::{
    Instruction as DbInstruction, OutputOpts as DbOutput,
};

use super::bucket::Bucket;
use super::merge_operators::MERGE_INDEX_ID;
use super::types::DbError;

/// `Collection` keeps one kind of record under `{prefix}:{id}`
///
/// Every saved id is merged into the `merge_index:{prefix}` bucket, which is how the
/// records are listed back
#[derive(Clone)]
pub struct Collection {
    db: Executor,
    prefix: &'static str,
}

impl Collection {
    pub fn new(db: Executor, prefix: &'static str) -> Self {
        Self { db, prefix }
    }

    fn build_key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }

    fn build_index_key(&self) -> String {
        format!("{}:{}", MERGE_INDEX_ID, self.prefix)
    }

    async fn get_key(&self, key: String) -> Result<Option<Vec<u8>>, DbError> {
        let output = self
            .db
            .exec(DbInstruction::GetCf { key })
            .await
            .map_err(|err| DbError::InstructionError(err.to_string()))?;

        match output {
            DbOutput::SingleByte { value } => Ok(value),
            _ => Err(DbError::OutputError("expected a single value".to_string())),
        }
    }

    pub async fn save(&self, id: &str, value: Vec<u8>) -> Result<(), DbError> {
        let _ = self
            .db
            .exec(DbInstruction::SaveCf {
                key: self.build_key(id),
                value,
            })
            .await
            .map_err(|err| DbError::InstructionError(err.to_string()))?;

        let _ = self
            .db
            .exec(DbInstruction::MergeCf {
                key: self.build_index_key(),
                value: id.as_bytes().to_vec(),
            })
            .await
            .map_err(|err| DbError::InstructionError(err.to_string()))?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.get_key(self.build_key(id)).await
    }

    pub async fn ids(&self) -> Result<Vec<String>, DbError> {
        let index = match self.get_key(self.build_index_key()).await? {
            Some(bytes) => bytes,
            None => return Ok(vec![]),
        };

        let bucket: Bucket<String> = index.try_into()?;
        Ok(bucket.iterate().cloned().collect())
    }

    /// Values of every indexed id, ids without a stored value are skipped
    pub async fn list(&self) -> Result<Vec<Vec<u8>>, DbError> {
        let keys: Vec<String> = self
            .ids()
            .await?
            .iter()
            .map(|id| self.build_key(id))
            .collect();

        if keys.is_empty() {
            return Ok(vec![]);
        }

        let output = self
            .db
            .exec(DbInstruction::MultiGetCf { keys })
            .await
            .map_err(|err| DbError::InstructionError(err.to_string()))?;

        match output {
            DbOutput::MultiBytes { values } => Ok(values
                .into_iter()
                .filter_map(|value| value.ok().flatten())
                .collect()),
            _ => Err(DbError::OutputError("expected multiple values".to_string())),
        }
    }
}
