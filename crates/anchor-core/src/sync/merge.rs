//! Last-write-wins merge of the local and remote anchor collections.

use std::collections::BTreeMap;

use crate::anchor::Anchor;

/// Which side of a conflict survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    KeepLocal,
    TakeRemote,
}

/// Resolve a conflict on the same id. Ties go to the local record.
pub fn resolve(local: &Anchor, remote: &Anchor) -> MergeDecision {
    if remote.effective_timestamp() > local.effective_timestamp() {
        MergeDecision::TakeRemote
    } else {
        MergeDecision::KeepLocal
    }
}

/// Merge normalized collections into the next canonical collection.
///
/// The result holds exactly the union of ids, sorted by effective
/// timestamp descending with id ascending as the tie-breaker. Merging a
/// collection with itself returns it unchanged (up to ordering).
pub fn merge_anchors(local: &[Anchor], remote: Vec<Anchor>) -> Vec<Anchor> {
    let mut by_id: BTreeMap<String, Anchor> = local
        .iter()
        .map(|a| (a.id.clone(), a.clone().normalized()))
        .collect();

    for incoming in remote {
        let incoming = incoming.normalized();
        match by_id.get(&incoming.id) {
            Some(existing) if resolve(existing, &incoming) == MergeDecision::KeepLocal => {}
            _ => {
                by_id.insert(incoming.id.clone(), incoming);
            }
        }
    }

    let mut merged: Vec<Anchor> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.effective_timestamp()
            .cmp(&a.effective_timestamp())
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorCategory;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    fn anchor(id: &str, text: &str, created: u32, updated: Option<u32>) -> Anchor {
        let mut a = Anchor::new(text, AnchorCategory::Career, at(created));
        a.id = id.into();
        a.updated_at = updated.map(at);
        a
    }

    #[test]
    fn newer_remote_wins() {
        let local = anchor("a", "local", 1, Some(2));
        let remote = anchor("a", "remote", 1, Some(3));
        assert_eq!(resolve(&local, &remote), MergeDecision::TakeRemote);
        let merged = merge_anchors(&[local], vec![remote]);
        assert_eq!(merged[0].intention_text, "remote");
    }

    #[test]
    fn newer_local_wins() {
        let local = anchor("a", "local", 1, Some(5));
        let remote = anchor("a", "remote", 1, Some(3));
        let merged = merge_anchors(&[local], vec![remote]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].intention_text, "local");
    }

    #[test]
    fn tie_goes_to_local() {
        let local = anchor("a", "local", 1, Some(4));
        let remote = anchor("a", "remote", 1, Some(4));
        assert_eq!(resolve(&local, &remote), MergeDecision::KeepLocal);
        assert_eq!(merge_anchors(&[local], vec![remote])[0].intention_text, "local");
    }

    #[test]
    fn created_at_is_the_fallback() {
        let local = anchor("a", "local", 6, None);
        let remote = anchor("a", "remote", 2, Some(5));
        assert_eq!(resolve(&local, &remote), MergeDecision::KeepLocal);
    }

    #[test]
    fn union_sorted_desc_with_id_tiebreak() {
        let local = vec![anchor("b", "b", 1, Some(3)), anchor("local-only", "x", 1, Some(1))];
        let remote = vec![
            anchor("remote-only", "y", 1, Some(5)),
            anchor("a", "a", 1, Some(3)),
        ];
        let ids: Vec<_> = merge_anchors(&local, remote)
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, ["remote-only", "a", "b", "local-only"]);
    }

    fn arb_anchor() -> impl Strategy<Value = Anchor> {
        ("[a-e]", 0u32..12, proptest::option::of(0u32..12))
            .prop_map(|(id, created, updated)| anchor(&id, &id, created, updated))
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(
            local in proptest::collection::vec(arb_anchor(), 0..6),
            remote in proptest::collection::vec(arb_anchor(), 0..6),
        ) {
            let once = merge_anchors(&local, remote.clone());
            let twice = merge_anchors(&once, remote);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merge_covers_union_of_ids(
            local in proptest::collection::vec(arb_anchor(), 0..6),
            remote in proptest::collection::vec(arb_anchor(), 0..6),
        ) {
            let merged = merge_anchors(&local, remote.clone());
            let mut expected: Vec<String> = local.iter().chain(remote.iter()).map(|a| a.id.clone()).collect();
            expected.sort();
            expected.dedup();
            let mut ids: Vec<String> = merged.iter().map(|a| a.id.clone()).collect();
            ids.sort();
            prop_assert_eq!(ids, expected);
        }
    }
}
