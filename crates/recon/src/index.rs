use std::collections::BTreeMap;

use crate::model::{MatchKey, Record};

/// Records of one side bucketed by match key. Buckets keep load order and
/// never collapse duplicates.
pub type KeyIndex = BTreeMap<MatchKey, Vec<Record>>;

/// Group records by (party id, invoice number).
pub fn index_records(records: Vec<Record>) -> KeyIndex {
    let mut index: KeyIndex = BTreeMap::new();
    for record in records {
        index.entry(record.key()).or_default().push(record);
    }
    for bucket in index.values_mut() {
        bucket.sort_by_key(|r| r.ordinal);
    }
    index
}

/// Keys holding more than one record.
pub fn duplicate_keys(index: &KeyIndex) -> impl Iterator<Item = (&MatchKey, usize)> {
    index
        .iter()
        .filter(|(_, bucket)| bucket.len() > 1)
        .map(|(key, bucket)| (key, bucket.len()))
}
