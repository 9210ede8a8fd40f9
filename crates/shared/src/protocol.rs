//! Wire format of a user entry in the realtime record store.
//!
//! Each entry is a flat JSON object stored under `<collection>/<id>`:
//!
//! ```json
//! { "id": "…", "name": "Alice", "age": 30, "imagePath": "/data/userImages/….jpg" }
//! ```
//!
//! "No image" is written by omitting `imagePath`. On read, a missing key,
//! `null`, or an empty string all decode to no image.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{sort_by_name, RecordId, UserRecord};

pub const DEFAULT_COLLECTION: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntryPayload {
    pub id: String,
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl From<&UserRecord> for UserEntryPayload {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.0.clone(),
            name: record.name.clone(),
            age: record.age,
            image_path: record
                .image_path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned())
                .filter(|path| !path.is_empty()),
        }
    }
}

/// Decodes a single entry, returning `None` when a required field is
/// missing or has the wrong type.
pub fn decode_entry(value: &Value) -> Option<UserRecord> {
    let fields = value.as_object()?;
    let id = fields.get("id")?.as_str()?;
    let name = fields.get("name")?.as_str()?;
    let age = decode_age(fields.get("age")?)?;
    let image_path = fields
        .get("imagePath")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);

    Some(UserRecord {
        id: RecordId::from(id),
        name: name.to_string(),
        age,
        image_path,
    })
}

fn decode_age(value: &Value) -> Option<u32> {
    if let Some(age) = value.as_u64() {
        return u32::try_from(age).ok();
    }
    // Some store backends hand integral numbers back as floats.
    let age = value.as_f64()?;
    if age.fract() == 0.0 && age >= 0.0 && age <= f64::from(u32::MAX) {
        Some(age as u32)
    } else {
        None
    }
}

/// Decodes a whole collection body (`null` or an object keyed by id) into a
/// name-sorted list. Malformed entries are skipped.
pub fn decode_collection(body: &Value) -> Vec<UserRecord> {
    let Some(entries) = body.as_object() else {
        return Vec::new();
    };

    let mut records: Vec<UserRecord> = entries.values().filter_map(decode_entry).collect();
    sort_by_name(&mut records);
    records
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn omits_image_path_when_absent() {
        let record = UserRecord::new(RecordId::from("a1"), "Alice", 30);
        let payload = serde_json::to_value(UserEntryPayload::from(&record)).expect("json");
        assert_eq!(payload, json!({ "id": "a1", "name": "Alice", "age": 30 }));
    }

    #[test]
    fn writes_image_path_in_camel_case() {
        let record =
            UserRecord::new(RecordId::from("a1"), "Alice", 30).with_image_path("/tmp/a1.jpg");
        let payload = serde_json::to_value(UserEntryPayload::from(&record)).expect("json");
        assert_eq!(payload["imagePath"], json!("/tmp/a1.jpg"));
    }

    #[test]
    fn empty_or_null_image_path_reads_as_absent() {
        let empty = json!({ "id": "a", "name": "A", "age": 1, "imagePath": "" });
        let null = json!({ "id": "b", "name": "B", "age": 2, "imagePath": null });
        assert_eq!(decode_entry(&empty).expect("entry").image_path, None);
        assert_eq!(decode_entry(&null).expect("entry").image_path, None);
    }

    #[test]
    fn drops_entries_missing_required_fields() {
        let body = json!({
            "a": { "id": "a", "name": "Alice", "age": 30 },
            "b": { "id": "b", "name": "Bob" },
            "c": { "name": "Carl", "age": 4 },
            "d": { "id": "d", "name": "Dana", "age": "forty" },
            "e": "not an object"
        });
        let records = decode_collection(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Alice");
        assert_eq!(records[0].age, 30);
    }

    #[test]
    fn accepts_integral_float_ages_only() {
        assert_eq!(
            decode_entry(&json!({ "id": "a", "name": "A", "age": 30.0 })).map(|r| r.age),
            Some(30)
        );
        assert!(decode_entry(&json!({ "id": "a", "name": "A", "age": 30.5 })).is_none());
        assert!(decode_entry(&json!({ "id": "a", "name": "A", "age": -1 })).is_none());
    }

    #[test]
    fn null_collection_is_empty_and_results_are_sorted() {
        assert!(decode_collection(&Value::Null).is_empty());

        let body = json!({
            "1": { "id": "1", "name": "bob", "age": 3 },
            "2": { "id": "2", "name": "Anna", "age": 4 }
        });
        let names: Vec<_> = decode_collection(&body)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["Anna", "bob"]);
    }
}
