//! Conversion between typed records and remote documents.
//!
//! Every decode runs the record's schema check, so a document written by a
//! newer client (or hand-edited) is rejected here instead of leaking a
//! half-understood record into the views.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use fangst_shared::records::Versioned;

use super::{Document, Snapshot};
use crate::error::RemoteError;

pub fn encode<T: Serialize>(record: &T) -> Result<Document, RemoteError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RemoteError::Decode(format!("expected an object, got {other}"))),
        Err(e) => Err(RemoteError::Decode(e.to_string())),
    }
}

/// Decode one document. The document id is injected as `id` when the body
/// does not carry one.
pub fn decode<T>(id: &str, mut doc: Document) -> Result<T, RemoteError>
where
    T: DeserializeOwned + Versioned,
{
    doc.entry("id").or_insert_with(|| Value::String(id.to_string()));
    let record: T = serde_json::from_value(Value::Object(doc))
        .map_err(|e| RemoteError::Decode(format!("{id}: {e}")))?;
    record
        .validate()
        .map_err(|e| RemoteError::Decode(format!("{id}: {e}")))?;
    Ok(record)
}

/// Decode every document in a snapshot, skipping the ones that fail.
pub fn decode_all<T>(snapshot: Snapshot) -> Vec<T>
where
    T: DeserializeOwned + Versioned,
{
    snapshot
        .docs
        .into_iter()
        .filter_map(|(id, doc)| match decode(&id, doc) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(doc_id = %id, error = %e, "skipping undecodable remote document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fangst_shared::{CatchRecord, UserProfile};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn decode_injects_document_id() {
        let body = doc(json!({
            "ownerId": "u1",
            "imageRef": "https://img/1.jpg",
            "waterType": "sea",
            "likesCount": -2,
            "createdAt": { "seconds": 10, "nanoseconds": 0 }
        }));
        let catch: CatchRecord = decode("abc", body).unwrap();
        assert_eq!(catch.id.as_str(), "abc");
        assert_eq!(catch.likes_count, 0);
        assert_eq!(catch.schema_version, 1);
    }

    #[test]
    fn decode_rejects_future_schema() {
        let body = doc(json!({ "uid": "u1", "schemaVersion": 9 }));
        let err = decode::<UserProfile>("u1", body).unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[test]
    fn decode_all_skips_bad_documents() {
        let snapshot = Snapshot {
            docs: vec![
                ("u1".into(), doc(json!({ "uid": "u1" }))),
                ("u2".into(), doc(json!({ "uid": 42 }))),
            ],
        };
        let profiles: Vec<UserProfile> = decode_all(snapshot);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].uid.as_str(), "u1");
    }

    #[test]
    fn encode_round_trips_profile_fields() {
        let profile = UserProfile::new_default("u1".into(), Some("a@b.se".into()), None);
        let body = encode(&profile).unwrap();
        assert_eq!(body.get("aiQuotaTotal"), Some(&json!(500)));
        assert_eq!(body.get("premiumType"), Some(&json!("none")));
    }
}
