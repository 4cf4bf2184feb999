//! JSON shape of the device-local replica.
//!
//! One object keyed by course key, each value carrying
//! `courseId`, `status`, `startedAt`, `completedAt`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reskill_core::model::{CourseKey, CourseProgress, ProgressTable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProgress {
    #[serde(default)]
    course_id: String,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

pub(crate) fn encode(table: &ProgressTable) -> Result<String, serde_json::Error> {
    let stored: BTreeMap<&str, StoredProgress> = table
        .iter()
        .map(|record| {
            (
                record.course_key().as_str(),
                StoredProgress {
                    course_id: record.course_key().as_str().to_owned(),
                    status: record.status().as_str().to_owned(),
                    started_at: record.started_at(),
                    completed_at: record.completed_at(),
                },
            )
        })
        .collect();
    serde_json::to_string(&stored)
}

/// Decode a stored replica.
///
/// The map key is authoritative for the course key. Individual records that
/// fail validation are dropped with a warning; a document that is not a map
/// of records is an error.
pub(crate) fn decode(raw: &str) -> Result<ProgressTable, serde_json::Error> {
    let stored: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)?;
    let mut table = ProgressTable::new();
    for (key, value) in stored {
        match decode_entry(&key, value) {
            Ok(record) => table.insert(record),
            Err(error) => {
                tracing::warn!(course_key = %key, %error, "dropping invalid local progress record");
            }
        }
    }
    Ok(table)
}

fn decode_entry(key: &str, value: serde_json::Value) -> Result<CourseProgress, String> {
    let entry: StoredProgress = serde_json::from_value(value).map_err(|err| err.to_string())?;
    let course_key = CourseKey::new(key).map_err(|err| err.to_string())?;
    CourseProgress::from_persisted(
        course_key,
        &entry.status,
        entry.started_at,
        entry.completed_at,
    )
    .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reskill_core::model::ProgressStatus;
    use reskill_core::time::fixed_now;

    #[test]
    fn encoded_table_decodes_to_same_records() {
        let mut table = ProgressTable::new();
        let now = fixed_now();
        table.apply(CourseKey::new("rust").unwrap(), ProgressStatus::InProgress, now);
        table.apply(CourseKey::new("rust-m1").unwrap(), ProgressStatus::Completed, now);
        table.apply(CourseKey::new("go").unwrap(), ProgressStatus::NotStarted, now);

        let raw = encode(&table).unwrap();
        assert_eq!(decode(&raw).unwrap(), table);
    }

    #[test]
    fn reads_the_browser_layout() {
        let raw = r#"{
            "data-science": {"courseId":"data-science","status":"in_progress","startedAt":"2024-03-01T10:00:00.000Z"},
            "data-science-m1": {"courseId":"data-science-m1","status":"completed","completedAt":"2024-03-02T10:00:00.000Z"}
        }"#;
        let table = decode(raw).unwrap();
        assert_eq!(table.len(), 2);
        let key = CourseKey::new("data-science-m1").unwrap();
        assert_eq!(table.status_of(&key), ProgressStatus::Completed);
    }

    #[test]
    fn invalid_records_are_dropped() {
        let raw = r#"{
            "a": {"courseId":"a","status":"in_progress"},
            "b": {"courseId":"b","status":"someday"},
            "c": {"courseId":"c","status":"completed"}
        }"#;
        let table = decode(raw).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unparseable_timestamp_drops_only_that_record() {
        let raw = r#"{
            "good": {"courseId":"good","status":"completed","completedAt":"2024-03-02T10:00:00.000Z"},
            "bad": {"courseId":"bad","status":"in_progress","startedAt":"yesterday"}
        }"#;
        let table = decode(raw).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.status_of(&CourseKey::new("good").unwrap()),
            ProgressStatus::Completed
        );
        assert!(table.get(&CourseKey::new("bad").unwrap()).is_none());
    }

    #[test]
    fn mistyped_status_drops_only_that_record() {
        let raw = r#"{
            "good": {"courseId":"good","status":"in_progress"},
            "bad": {"courseId":"bad","status":2},
            "worse": "not a record"
        }"#;
        let table = decode(raw).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.status_of(&CourseKey::new("good").unwrap()),
            ProgressStatus::InProgress
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode("not json").is_err());
        assert!(decode("[1,2,3]").is_err());
    }
}
