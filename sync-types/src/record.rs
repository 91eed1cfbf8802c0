//! Records and ordered collection snapshots.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::collection::SortDirection;
use crate::error::PayloadError;
use crate::ids::{OrderingKey, RecordId};

/// Arbitrary payload fields of a record, specific to the collection's purpose.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// The unit stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier, unique within the collection.
    pub id: RecordId,
    /// Display-order key.
    pub ordering_key: OrderingKey,
    /// Collection-specific payload.
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    /// Decode the payload fields into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        serde_json::from_value(serde_json::Value::Object(self.fields.clone()))
            .map_err(PayloadError::Decode)
    }
}

/// A record as submitted for creation, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Display-order key.
    pub ordering_key: OrderingKey,
    /// Collection-specific payload.
    #[serde(default)]
    pub fields: Fields,
}

impl NewRecord {
    /// Create a record draft from raw fields.
    pub fn new(ordering_key: OrderingKey, fields: Fields) -> Self {
        Self {
            ordering_key,
            fields,
        }
    }

    /// Create a record draft by serializing a typed payload.
    ///
    /// The payload must serialize to a JSON object.
    pub fn from_payload<T: Serialize>(
        ordering_key: OrderingKey,
        payload: &T,
    ) -> Result<Self, PayloadError> {
        match serde_json::to_value(payload).map_err(PayloadError::Encode)? {
            serde_json::Value::Object(fields) => Ok(Self::new(ordering_key, fields)),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// Attach a store-assigned id, producing the stored record.
    pub fn with_id(self, id: RecordId) -> Record {
        Record {
            id,
            ordering_key: self.ordering_key,
            fields: self.fields,
        }
    }
}

/// A complete, ordered, point-in-time view of a collection.
///
/// Snapshots are immutable once built; observers share them through `Arc`
/// so a reader never sees a partially applied update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    records: Vec<Record>,
}

impl CollectionSnapshot {
    /// An empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap records that are already in the subscription's order.
    ///
    /// The order is taken as given; the remote is the source of truth.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build a snapshot by sorting records by ordering key.
    ///
    /// The sort is stable, so records with equal keys keep insertion order.
    pub fn ordered(mut records: Vec<Record>, direction: SortDirection) -> Self {
        match direction {
            SortDirection::Ascending => records.sort_by(|a, b| a.ordering_key.cmp(&b.ordering_key)),
            SortDirection::Descending => {
                records.sort_by(|a, b| b.ordering_key.cmp(&a.ordering_key))
            }
        }
        Self { records }
    }

    /// Wrap in an `Arc` for sharing with observers.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterate over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by id.
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Whether a record with this id is present.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    /// The set of record ids in this snapshot.
    pub fn ids(&self) -> BTreeSet<RecordId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// Check that records are ordered by key in the given direction.
    pub fn is_ordered(&self, direction: SortDirection) -> bool {
        self.records.windows(2).all(|pair| match direction {
            SortDirection::Ascending => pair[0].ordering_key <= pair[1].ordering_key,
            SortDirection::Descending => pair[0].ordering_key >= pair[1].ordering_key,
        })
    }
}

impl<'a> IntoIterator for &'a CollectionSnapshot {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, millis: i64) -> Record {
        NewRecord::new(OrderingKey::from_millis(millis), Fields::new()).with_id(RecordId::from(id))
    }

    #[test]
    fn ordered_ascending_is_chronological() {
        let snapshot = CollectionSnapshot::ordered(
            vec![record("c", 300), record("a", 100), record("b", 200)],
            SortDirection::Ascending,
        );
        let ids: Vec<_> = snapshot.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(snapshot.is_ordered(SortDirection::Ascending));
    }

    #[test]
    fn ordered_descending_is_newest_first() {
        let snapshot = CollectionSnapshot::ordered(
            vec![record("a", 100), record("c", 300), record("b", 200)],
            SortDirection::Descending,
        );
        let ids: Vec<_> = snapshot.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert!(!snapshot.is_ordered(SortDirection::Ascending));
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let snapshot = CollectionSnapshot::ordered(
            vec![record("first", 5), record("second", 5)],
            SortDirection::Descending,
        );
        assert_eq!(snapshot.records()[0].id.as_str(), "first");
    }

    #[test]
    fn lookup_by_id() {
        let snapshot = CollectionSnapshot::from_records(vec![record("x", 1)]);
        assert!(snapshot.contains(&RecordId::from("x")));
        assert!(snapshot.get(&RecordId::from("y")).is_none());
        assert_eq!(snapshot.ids().len(), 1);
    }

    #[test]
    fn from_payload_rejects_non_objects() {
        let result = NewRecord::from_payload(OrderingKey::from_millis(0), &42);
        assert!(matches!(result, Err(PayloadError::NotAnObject)));
    }

    #[test]
    fn decode_reads_fields() {
        #[derive(serde::Deserialize)]
        struct Note {
            text: String,
        }

        let mut fields = Fields::new();
        fields.insert("text".into(), json!("hello"));
        let rec = NewRecord::new(OrderingKey::from_millis(1), fields).with_id("n1".into());
        let note: Note = rec.decode().unwrap();
        assert_eq!(note.text, "hello");
    }
}
