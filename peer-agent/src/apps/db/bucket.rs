use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use super::types::DbError;

/// `Bucket` is a list of values stored under a single key
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(crate = "self::serde")]
pub struct Bucket<T>
where
    T: TryInto<Vec<u8>> + Serialize,
{
    collections: Vec<T>,
}

impl<T> Bucket<T>
where
    T: TryInto<Vec<u8>> + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            collections: Vec::new(),
        }
    }

    pub fn add(&mut self, val: T) {
        self.collections.push(val)
    }

    pub fn iterate(&self) -> impl Iterator<Item = &T> {
        self.collections.iter()
    }
}

impl<T> Bucket<T>
where
    T: TryInto<Vec<u8>> + Serialize + DeserializeOwned + PartialEq,
{
    /// Adds `val` unless the bucket already holds it
    pub fn add_unique(&mut self, val: T) {
        if !self.collections.contains(&val) {
            self.collections.push(val)
        }
    }
}

impl<T> TryInto<Vec<u8>> for Bucket<T>
where
    T: TryInto<Vec<u8>> + Serialize,
{
    type Error = DbError;
    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        let json =
            serde_json::to_vec(&self).map_err(|err| DbError::BucketError(err.to_string()))?;

        Ok(json)
    }
}

impl<T> TryFrom<Vec<u8>> for Bucket<T>
where
    T: TryInto<Vec<u8>> + Serialize + DeserializeOwned,
{
    type Error = DbError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let bucket: Self =
            serde_json::from_slice(&value).map_err(|err| DbError::BucketError(err.to_string()))?;
        Ok(bucket)
    }
}
