//! Reciprocal Rank Fusion (RRF) for combining ranked lists.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use ragkit_core::{RagError, Result};

/// RRF constant (commonly 60).
/// Higher values give more weight to lower-ranked results.
pub const RRF_K: u32 = 60;

/// Fuse ranked id lists using weighted Reciprocal Rank Fusion.
///
/// RRF score = Σ w_i / (k + rank_i), with 1-based ranks.
///
/// Every list is first extended with the ids of the union it did not
/// return, in first-seen order, so each id gets a contribution from every
/// list. Duplicates within one list count once, at their first rank.
///
/// # Returns
/// Every id of the union with its fused score, sorted by score
/// descending. Equal scores keep first-seen order.
pub fn reciprocal_rank_fusion<Id>(
    lists: &[Vec<Id>],
    weights: &[f32],
    k: u32,
) -> Result<Vec<(Id, f32)>>
where
    Id: Copy + Eq + Hash,
{
    if lists.len() != weights.len() {
        return Err(RagError::config(format!(
            "{} ranked lists but {} weights",
            lists.len(),
            weights.len()
        )));
    }

    // Union in first-seen order
    let mut position: HashMap<Id, usize> = HashMap::new();
    let mut union: Vec<Id> = Vec::new();
    for id in lists.iter().flatten() {
        position.entry(*id).or_insert_with(|| {
            union.push(*id);
            union.len() - 1
        });
    }

    let mut scores = vec![0.0f32; union.len()];
    for (list, weight) in lists.iter().zip(weights) {
        let mut seen: HashSet<Id> = HashSet::with_capacity(union.len());
        let ranked = list
            .iter()
            .chain(union.iter())
            .filter(|id| seen.insert(**id));

        for (rank, id) in ranked.enumerate() {
            scores[position[id]] += weight / (rank as f32 + 1.0 + k as f32);
        }
    }

    let mut fused: Vec<(Id, f32)> = union.into_iter().zip(scores).collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(fused)
}
