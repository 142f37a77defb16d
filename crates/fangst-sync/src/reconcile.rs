//! Merge-and-sort of remote and locally cached catches.
//!
//! Pure functions: safe to run on every snapshot.

use std::cmp::Reverse;
use std::collections::HashSet;

use fangst_shared::constants::{PLACEHOLDER_ID_PREFIX, SCHEMA_VERSION};
use fangst_shared::timestamp::sort_key;
use fangst_shared::{AiResult, CatchId, CatchRecord, Edibility, UserId, WaterType};

/// Concatenate remote then local, keep the first record per canonical id,
/// and sort newest first. Missing or unreadable creation times sort last.
///
/// A local fallback `local-<uuid>` shares its canonical id with the remote
/// `<uuid>`, so the remote copy wins when both exist.
pub fn reconcile(remote: Vec<CatchRecord>, local: Vec<CatchRecord>) -> Vec<CatchRecord> {
    let mut seen = HashSet::new();
    let mut merged: Vec<CatchRecord> = remote
        .into_iter()
        .chain(local)
        .filter(|c| seen.insert(c.id.canonical().to_string()))
        .collect();
    // Stable: equal times keep remote-before-local input order.
    merged.sort_by_key(|c| Reverse(sort_key(c.created_at.as_ref())));
    tracing::debug!(count = merged.len(), "reconciled catch view");
    merged
}

/// The view shown while the remote store is unreachable: everything cached
/// locally, followed by the synthetic placeholders.
pub fn degraded_view(local: Vec<CatchRecord>) -> Vec<CatchRecord> {
    let mut view = reconcile(Vec::new(), local);
    view.extend(placeholders());
    view
}

/// Illustrative catches for an empty, offline feed. Never persisted.
pub fn placeholders() -> Vec<CatchRecord> {
    [
        ("1", "Gädda", "Esox lucius", WaterType::Lake, "Vänern", Edibility::Yes),
        ("2", "Torsk", "Gadus morhua", WaterType::Sea, "Öresund", Edibility::Yes),
        ("3", "Öring", "Salmo trutta", WaterType::River, "Dalälven", Edibility::Depends),
    ]
    .into_iter()
    .map(|(n, species, latin, water_type, place, edible)| CatchRecord {
        schema_version: SCHEMA_VERSION,
        id: CatchId(format!("{PLACEHOLDER_ID_PREFIX}{n}")),
        owner_id: UserId::from("placeholder"),
        image_ref: String::new(),
        location_text: place.to_string(),
        water_type,
        comment: String::new(),
        is_public: true,
        ai_result: Some(AiResult {
            species_name: species.to_string(),
            latin_name: latin.to_string(),
            confidence: None,
            description: String::new(),
            edible,
            edible_notes: String::new(),
            recipe_title: String::new(),
            recipe_ingredients: Vec::new(),
            recipe_steps: Vec::new(),
            cooking_method: String::new(),
        }),
        likes_count: 0,
        comments_count: 0,
        created_at: None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fangst_shared::{NewCatch, Timestamp};

    fn catch(id: &str, created_at: Option<Timestamp>) -> CatchRecord {
        NewCatch {
            owner_id: "u1".into(),
            image_ref: "img".into(),
            location_text: String::new(),
            water_type: WaterType::Lake,
            comment: id.into(),
            is_public: true,
            ai_result: None,
        }
        .into_record(CatchId::from(id), created_at)
    }

    fn ids(view: &[CatchRecord]) -> Vec<&str> {
        view.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn distinct_ids_are_all_kept_and_sorted_descending() {
        let remote = vec![
            catch("a", Some(Timestamp::Server { seconds: 2, nanoseconds: 0 })),
            catch("b", Some(Timestamp::Millis(500.0))),
        ];
        let local = vec![
            catch("local-c", Some(Timestamp::Millis(3_000.0))),
            catch("local-d", Some(Timestamp::Text("1970-01-01T00:00:01Z".into()))),
        ];
        let view = reconcile(remote, local);
        assert_eq!(ids(&view), vec!["local-c", "a", "local-d", "b"]);
    }

    #[test]
    fn same_id_keeps_the_remote_entry() {
        let mut remote_copy = catch("x", Some(Timestamp::Millis(10.0)));
        remote_copy.likes_count = 9;
        let local_copy = catch("x", Some(Timestamp::Millis(99.0)));
        let view = reconcile(vec![remote_copy.clone()], vec![local_copy]);
        assert_eq!(view, vec![remote_copy]);
    }

    #[test]
    fn local_twin_of_remote_record_is_suppressed() {
        let id = CatchId::new_remote();
        let remote = vec![catch(id.as_str(), Some(Timestamp::Millis(1.0)))];
        let local = vec![catch(id.to_local().as_str(), Some(Timestamp::Millis(2.0)))];
        let view = reconcile(remote, local);
        assert_eq!(ids(&view), vec![id.as_str()]);
    }

    #[test]
    fn missing_or_bad_timestamps_sort_last() {
        let view = reconcile(
            vec![
                catch("none", None),
                catch("bad", Some(Timestamp::Text("yesterday".into()))),
                catch("ok", Some(Timestamp::Millis(1.0))),
            ],
            Vec::new(),
        );
        assert_eq!(ids(&view), vec!["ok", "none", "bad"]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let remote = vec![catch("a", Some(Timestamp::Millis(1.0))), catch("b", None)];
        let local = vec![catch("local-a", Some(Timestamp::Millis(5.0)))];
        let once = reconcile(remote.clone(), local.clone());
        let twice = reconcile(once.clone(), Vec::new());
        assert_eq!(once, twice);
        assert_eq!(once, reconcile(remote, local));
    }

    #[test]
    fn degraded_view_keeps_local_records_and_adds_placeholders() {
        let local = vec![catch("local-1", Some(Timestamp::Millis(1.0)))];
        let view = degraded_view(local);
        assert_eq!(view.len(), 4);
        assert_eq!(view[0].id.as_str(), "local-1");
        assert!(view[1..].iter().all(|c| c.id.is_placeholder()));
    }

    #[test]
    fn placeholders_never_collide_with_local_ids() {
        let local = vec![catch("local-1", None)];
        let view = reconcile(placeholders(), local);
        assert_eq!(view.len(), 4);
    }
}
