//! Hybrid score fusion.
//!
//! Keyword and semantic result lists are each normalized into [0, 1] by
//! dividing by the list's maximum score, then combined with equal weights.
//! A memory absent from one list contributes 0 from that side.

use std::collections::HashMap;

/// Weight of the keyword side in hybrid scores
pub const HYBRID_KEYWORD_WEIGHT: f32 = 0.5;
/// Weight of the semantic side in hybrid scores
pub const HYBRID_SEMANTIC_WEIGHT: f32 = 0.5;

/// Normalize scores into [0, 1] by the list maximum. A list whose maximum is
/// zero (or negative, which BM25 never produces after sign-flipping) is
/// passed through unchanged.
pub fn max_normalize(results: &[(String, f32)]) -> Vec<(String, f32)> {
    let max = results.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max);
    if max <= 0.0 {
        return results.to_vec();
    }
    results
        .iter()
        .map(|(id, s)| (id.clone(), s / max))
        .collect()
}

/// Combine keyword and semantic lists into hybrid scores.
///
/// Returns `(id, combined)` sorted by combined score descending. Ties are
/// left to the caller's ordering pass, which also has access to access times
/// and ids.
pub fn hybrid_combine(
    keyword_results: &[(String, f32)],
    semantic_results: &[(String, f32)],
) -> Vec<(String, f32)> {
    let keyword_norm = max_normalize(keyword_results);
    let semantic_norm = max_normalize(semantic_results);

    let mut scores: HashMap<String, f32> = HashMap::new();
    for (id, s) in &keyword_norm {
        *scores.entry(id.clone()).or_default() += s * HYBRID_KEYWORD_WEIGHT;
    }
    for (id, s) in &semantic_norm {
        *scores.entry(id.clone()).or_default() += s * HYBRID_SEMANTIC_WEIGHT;
    }

    let mut combined: Vec<(String, f32)> = scores.into_iter().collect();
    combined.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    combined
}
