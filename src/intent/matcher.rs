//! # Intent Matcher
//!
//! Nearest-neighbour search over the embedding cache with a rejection
//! threshold. A linear scan is plenty for a catalogue of a few dozen phrases.

use crate::intent::catalogue::EmbeddingCache;
use crate::intent::error::EngineResult;
use crate::intent::vector::cosine_similarity;
use serde::Serialize;

/// Default minimum similarity for a match to be accepted.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Outcome of matching one input vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentMatch {
    /// Best intent, or `None` when the best score is below the threshold.
    pub intent: Option<String>,
    /// Best similarity found, reported even when the match is rejected.
    pub score: f32,
}

impl IntentMatch {
    pub fn none() -> Self {
        Self { intent: None, score: 0.0 }
    }
}

/// Similarity of the input against one catalogue phrase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPhrase {
    pub intent: String,
    pub phrase: String,
    pub score: f32,
}

/// Find the best catalogue entry for `input`.
///
/// Ties go to the entry that appears first in the cache. An empty input or
/// a best score strictly below `threshold` yields no intent.
pub fn match_intent(input: &[f32], cache: &EmbeddingCache, threshold: f32) -> EngineResult<IntentMatch> {
    if input.is_empty() {
        return Ok(IntentMatch::none());
    }

    let mut best: Option<(&str, f32)> = None;
    for entry in cache.entries() {
        let score = cosine_similarity(input, &entry.embedding)?;
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((&entry.intent, score)),
        }
    }

    let Some((intent, score)) = best else {
        return Ok(IntentMatch::none());
    };

    tracing::debug!("Best command match: {} with score {:.3}", intent, score);

    if score < threshold {
        return Ok(IntentMatch { intent: None, score });
    }

    Ok(IntentMatch {
        intent: Some(intent.to_string()),
        score,
    })
}

/// Score every cache entry against `input`, highest first.
///
/// Equal scores keep cache order.
pub fn rank(input: &[f32], cache: &EmbeddingCache) -> EngineResult<Vec<RankedPhrase>> {
    let mut ranked = Vec::with_capacity(cache.len());
    for entry in cache.entries() {
        ranked.push(RankedPhrase {
            intent: entry.intent.clone(),
            phrase: entry.phrase.clone(),
            score: cosine_similarity(input, &entry.embedding)?,
        });
    }

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::catalogue::CatalogueEntry;
    use crate::intent::error::EngineError;

    fn entry(intent: &str, embedding: Vec<f32>) -> CatalogueEntry {
        CatalogueEntry {
            intent: intent.to_string(),
            phrase: format!("{} phrase", intent),
            embedding,
        }
    }

    /// Unit vector whose cosine with `[1, 0]` is exactly `similarity`.
    fn at_similarity(similarity: f32) -> Vec<f32> {
        vec![similarity, (1.0 - similarity * similarity).sqrt()]
    }

    fn charge_discharge_cache() -> EmbeddingCache {
        EmbeddingCache::from_entries(vec![
            entry("charge", at_similarity(0.9)),
            entry("discharge", at_similarity(0.4)),
        ])
        .unwrap()
    }

    #[test]
    fn test_threshold_accepts_and_rejects() {
        let cache = charge_discharge_cache();
        let input = [1.0, 0.0];

        let accepted = match_intent(&input, &cache, 0.7).unwrap();
        assert_eq!(accepted.intent.as_deref(), Some("charge"));
        assert!((accepted.score - 0.9).abs() < 1e-5);

        let rejected = match_intent(&input, &cache, 0.95).unwrap();
        assert_eq!(rejected.intent, None);
        assert!((rejected.score - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_score_equal_to_threshold_is_accepted() {
        let cache = EmbeddingCache::from_entries(vec![entry("exact", vec![1.0, 0.0])]).unwrap();
        let result = match_intent(&[1.0, 0.0], &cache, 1.0).unwrap();
        assert_eq!(result.intent.as_deref(), Some("exact"));
    }

    #[test]
    fn test_first_entry_wins_ties() {
        let cache = EmbeddingCache::from_entries(vec![
            entry("first", vec![0.0, 1.0]),
            entry("second", vec![0.0, 1.0]),
            entry("third", vec![1.0, 0.0]),
        ])
        .unwrap();

        let result = match_intent(&[0.0, 1.0], &cache, 0.5).unwrap();
        assert_eq!(result.intent.as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_input_and_empty_cache() {
        let cache = charge_discharge_cache();
        assert_eq!(match_intent(&[], &cache, 0.0).unwrap(), IntentMatch::none());
        assert_eq!(
            match_intent(&[1.0, 0.0], &EmbeddingCache::default(), -1.0).unwrap(),
            IntentMatch::none()
        );
    }

    #[test]
    fn test_dimension_mismatch_propagates() {
        let cache = charge_discharge_cache();
        let err = match_intent(&[1.0, 0.0, 0.0], &cache, 0.7).unwrap_err();
        assert_eq!(err, EngineError::DimensionMismatch { left: 3, right: 2 });
    }

    #[test]
    fn test_rank_orders_by_score() {
        let cache = charge_discharge_cache();
        let ranked = rank(&[0.0, 1.0], &cache).unwrap();
        assert_eq!(ranked[0].intent, "discharge");
        assert_eq!(ranked[1].intent, "charge");
    }
}
