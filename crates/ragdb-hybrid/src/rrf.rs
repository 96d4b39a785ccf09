//! Reciprocal-rank fusion.
//!
//! Each candidate scores `sum(1 / (c + rank))` over the lists it appears
//! in, with 1-based ranks. Raw engine scores never mix; only ranks do,
//! so the two engines' incomparable scales cannot skew the result.

use std::collections::HashMap;

use ragdb_core::types::{FusedHit, SearchHit};

/// Fuse the two ranked lists. Output is sorted by fused score
/// descending; ties break by first appearance (vector list before text
/// list), then by chunk id, so the ordering is fully deterministic.
pub fn fuse(vector_hits: &[SearchHit], text_hits: &[SearchHit], c: f32) -> Vec<FusedHit> {
    let mut scores: HashMap<&str, (f32, usize)> = HashMap::new();
    let mut first_seen = 0usize;
    for list in [vector_hits, text_hits] {
        for (rank, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (c + (rank + 1) as f32);
            let entry = scores.entry(hit.id.as_str()).or_insert_with(|| {
                first_seen += 1;
                (0.0, first_seen)
            });
            entry.0 += contribution;
        }
    }
    let mut fused: Vec<(FusedHit, usize)> = scores
        .into_iter()
        .map(|(id, (score, seen))| (FusedHit { id: id.to_string(), score }, seen))
        .collect();
    fused.sort_by(|(a, a_seen), (b, b_seen)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a_seen.cmp(b_seen))
            .then(a.id.cmp(&b.id))
    });
    fused.into_iter().map(|(hit, _)| hit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::SourceKind;

    fn hits(kind: SourceKind, ids: &[&str]) -> Vec<SearchHit> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| SearchHit {
                id: (*id).to_string(),
                score: 10.0 - i as f32,
                source: kind,
            })
            .collect()
    }

    #[test]
    fn chunk_in_both_lists_beats_single_list_peers() {
        let vector = hits(SourceKind::Vector, &["a", "b", "c"]);
        let text = hits(SourceKind::Text, &["b", "d", "e"]);
        let fused = fuse(&vector, &text, 60.0);
        assert_eq!(fused[0].id, "b");
    }

    #[test]
    fn fusion_is_deterministic() {
        let vector = hits(SourceKind::Vector, &["a", "b", "c"]);
        let text = hits(SourceKind::Text, &["c", "d"]);
        let once = fuse(&vector, &text, 60.0);
        let twice = fuse(&vector, &text, 60.0);
        let ids: Vec<_> = once.iter().map(|h| h.id.as_str()).collect();
        let ids2: Vec<_> = twice.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ids2);
    }

    #[test]
    fn equal_rank_ties_break_by_first_appearance() {
        // "a" and "x" each appear once at rank 1 of their list; "a" came
        // from the vector list, which is scanned first.
        let vector = hits(SourceKind::Vector, &["a"]);
        let text = hits(SourceKind::Text, &["x"]);
        let fused = fuse(&vector, &text, 60.0);
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[1].id, "x");
    }

    #[test]
    fn improving_a_rank_never_lowers_the_fused_score() {
        let text = hits(SourceKind::Text, &["p", "q"]);
        let worse = fuse(&hits(SourceKind::Vector, &["z", "q"]), &text, 60.0);
        let better = fuse(&hits(SourceKind::Vector, &["q", "z"]), &text, 60.0);
        let score = |fused: &[FusedHit]| {
            fused.iter().find(|h| h.id == "q").map(|h| h.score).unwrap()
        };
        assert!(score(&better) > score(&worse));
    }

    #[test]
    fn empty_lists_fuse_to_empty() {
        assert!(fuse(&[], &[], 60.0).is_empty());
    }
}
