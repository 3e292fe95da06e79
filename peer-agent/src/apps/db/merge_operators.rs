use rstdev_storage::engine::rocksdb::lib::rust_rocksdb::merge_operator::MergeOperands;

use super::bucket::Bucket;
use super::types::DbError;

pub const MERGE_INDEX_ID: &str = "merge_index";

fn merge_index_builder(existing: Option<&[u8]>) -> Option<Bucket<String>> {
    existing.map_or_else(
        || Some(Bucket::new()),
        |val| {
            let bin_builder: Result<Bucket<String>, DbError> = val.to_vec().try_into();
            bin_builder.ok()
        },
    )
}

/// Each operand is either a single id or a bucket produced by an earlier partial merge
fn merge_index_ids<'a>(
    existing: Option<&[u8]>,
    operands: impl IntoIterator<Item = &'a [u8]>,
) -> Option<Vec<u8>> {
    let mut bucket = merge_index_builder(existing)?;

    for op in operands {
        let partial: Result<Bucket<String>, DbError> = op.to_vec().try_into();
        match partial {
            Ok(partial) => partial
                .iterate()
                .for_each(|id| bucket.add_unique(id.to_owned())),
            Err(_) => {
                if let Ok(id) = String::from_utf8(op.to_vec()) {
                    bucket.add_unique(id);
                }
            }
        }
    }

    let output: Result<Vec<u8>, DbError> = bucket.try_into();
    output.ok()
}

pub fn merge_index(
    new_key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let is_index = std::str::from_utf8(new_key)
        .map(|key| key.starts_with(MERGE_INDEX_ID))
        .unwrap_or(false);

    if !is_index {
        let existing_val = existing.map(|val| val.to_vec())?;
        return Some(existing_val);
    }

    merge_index_ids(existing, operands)
}
