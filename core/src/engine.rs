use crate::content::MAX_QUERY_WORDS;
use crate::encoder::TextEncoder;
use crate::error::{RecError, Result};
use crate::{
    CollaborativeRecommender, ContentBasedRecommender, ItemId, Recommendation, SampleSelector, SampledRating, Snapshot,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Results for a free-text query.
    pub text_k: usize,
    /// Results for a library (item id) query.
    pub item_k: usize,
    /// Neighbor users consulted for a collaborative query.
    pub cf_neighbors: usize,
    /// Results for a collaborative query.
    pub cf_recs: usize,
    /// Item columns drawn for the cold-start sample.
    pub sample_size: usize,
    pub max_query_words: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { text_k: 5, item_k: 20, cf_neighbors: 200, cf_recs: 20, sample_size: 9, max_query_words: MAX_QUERY_WORDS }
    }
}

/// Entry point for callers: string ids in, ranked recommendations out.
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct RecommendationEngine {
    snapshot: Arc<Snapshot>,
    encoder: Arc<dyn TextEncoder>,
    config: EngineConfig,
}

impl RecommendationEngine {
    pub fn new(snapshot: Arc<Snapshot>, encoder: Arc<dyn TextEncoder>, config: EngineConfig) -> Result<Self> {
        let index = snapshot.index();
        if !index.is_empty() && index.dim() != encoder.dim() {
            return Err(RecError::DimensionMismatch { expected: index.dim(), actual: encoder.dim() });
        }
        Ok(Self { snapshot, encoder, config })
    }

    pub fn snapshot(&self) -> &Snapshot { &self.snapshot }

    pub fn config(&self) -> &EngineConfig { &self.config }

    fn content(&self) -> ContentBasedRecommender<'_> {
        ContentBasedRecommender::new(&self.snapshot, self.encoder.as_ref())
            .with_max_query_words(self.config.max_query_words)
    }

    pub fn cbf_query(&self, text: &str) -> Result<Vec<Recommendation>> {
        self.content().recommend_by_text(text, self.config.text_k)
    }

    pub fn cbf_by_item(&self, item_id: &str) -> Result<Vec<Recommendation>> {
        let raw = parse_id("item", item_id)?;
        let item_id = ItemId::try_from(raw)
            .map_err(|_| RecError::UnknownItem { item_id: raw, num_items: self.snapshot.num_items() })?;
        self.content().recommend_by_item(item_id, self.config.item_k)
    }

    pub fn cf_query(&self, user_id: &str) -> Result<Vec<Recommendation>> {
        let raw = parse_id("user", user_id)?;
        let user_id = UserId::try_from(raw)
            .map_err(|_| RecError::UnknownUser { user_id: raw, num_users: self.snapshot.ratings().n_users() })?;
        let cf = CollaborativeRecommender::new(self.snapshot.ratings());
        cf.get_top_m_recs_k_neighbors(user_id, self.config.cf_neighbors, self.config.cf_recs)?
            .into_iter()
            .map(|(score, item_id)| -> Result<Recommendation> {
                Ok(Recommendation { item_id, title: self.snapshot.title(item_id)?.to_string(), score })
            })
            .collect()
    }

    pub fn sample(&self, k: usize) -> Result<Vec<SampledRating>> {
        SampleSelector::new(&self.snapshot).sample_users(k)
    }
}

/// Any non-negative integer parses; range checks against the catalog happen later.
/// Integers past `u64::MAX` saturate, so they still surface as unknown ids.
fn parse_id(kind: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(id) => Ok(id),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(u64::MAX),
        Err(_) => Err(RecError::InvalidInput(format!("{kind} id {raw:?} is not a non-negative integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmbeddingIndex, HashingEncoder, InteractionMatrix};

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("item", " 42 ").unwrap(), 42);
        assert!(matches!(parse_id("item", "-1"), Err(RecError::InvalidInput(_))));
        assert!(matches!(parse_id("user", "abc"), Err(RecError::InvalidInput(_))));
        assert!(matches!(parse_id("user", ""), Err(RecError::InvalidInput(_))));
        assert_eq!(parse_id("user", "4294967296").unwrap(), 4_294_967_296);
    }

    #[test]
    fn ids_beyond_id_range_are_unknown_not_invalid() {
        let index = EmbeddingIndex::build(&[vec![0.0, 1.0]]).unwrap();
        let snap = Snapshot::new(vec!["x".into()], index, InteractionMatrix::from_triplets(1, 1, vec![]).unwrap()).unwrap();
        let encoder = Arc::new(HashingEncoder::new(2).unwrap());
        let engine = RecommendationEngine::new(Arc::new(snap), encoder, EngineConfig::default()).unwrap();

        assert_eq!(
            engine.cbf_by_item("4294967296").unwrap_err(),
            RecError::UnknownItem { item_id: 4_294_967_296, num_items: 1 }
        );
        assert_eq!(
            engine.cf_query("18446744073709551615").unwrap_err(),
            RecError::UnknownUser { user_id: u64::MAX, num_users: 1 }
        );
        assert!(matches!(engine.cf_query("18446744073709551616"), Err(RecError::UnknownUser { .. })));
    }

    #[test]
    fn encoder_dimension_must_match_index() {
        let index = EmbeddingIndex::build(&[vec![0.0, 1.0]]).unwrap();
        let snap = Snapshot::new(vec!["x".into()], index, InteractionMatrix::from_triplets(0, 1, vec![]).unwrap()).unwrap();
        let encoder = Arc::new(HashingEncoder::new(3).unwrap());
        let err = RecommendationEngine::new(Arc::new(snap), encoder, EngineConfig::default()).err();
        assert_eq!(err, Some(RecError::DimensionMismatch { expected: 2, actual: 3 }));
    }
}
