use crate::encoder::TextEncoder;
use crate::error::{RecError, Result};
use crate::tokenizer::truncate_words;
use crate::{ItemId, Recommendation, Snapshot};

pub const MAX_QUERY_WORDS: usize = 256;

/// Nearest-neighbor recommendations over item content embeddings.
pub struct ContentBasedRecommender<'a> {
    snapshot: &'a Snapshot,
    encoder: &'a dyn TextEncoder,
    max_query_words: usize,
}

impl<'a> ContentBasedRecommender<'a> {
    pub fn new(snapshot: &'a Snapshot, encoder: &'a dyn TextEncoder) -> Self {
        Self { snapshot, encoder, max_query_words: MAX_QUERY_WORDS }
    }

    pub fn with_max_query_words(mut self, max_query_words: usize) -> Self {
        self.max_query_words = max_query_words;
        self
    }

    /// Encode free text and return the `k` closest items. Words past the
    /// configured limit are dropped before encoding.
    pub fn recommend_by_text(&self, text: &str, k: usize) -> Result<Vec<Recommendation>> {
        let query = truncate_words(text, self.max_query_words);
        if query.is_empty() {
            return Err(RecError::EncodingError("query text is empty".into()));
        }
        let vector = self.encoder.encode(&query)?;
        let dim = self.snapshot.index().dim();
        if vector.len() != dim && !self.snapshot.index().is_empty() {
            return Err(RecError::EncodingError(format!(
                "encoder produced {} dimensions, index expects {dim}",
                vector.len()
            )));
        }
        let hits = self.snapshot.index().query(&vector, k)?;
        tracing::debug!(words = query.split(' ').count(), hits = hits.len(), "text query");
        self.to_recommendations(hits)
    }

    /// Items closest to `item_id`'s own embedding, never including `item_id`.
    pub fn recommend_by_item(&self, item_id: ItemId, k: usize) -> Result<Vec<Recommendation>> {
        if k == 0 {
            return Err(RecError::InvalidInput("k must be at least 1".into()));
        }
        let index = self.snapshot.index();
        let vector = index.vector(item_id)?;
        let hits: Vec<(ItemId, f32)> = index
            .query(vector, k.saturating_add(1))?
            .into_iter()
            .filter(|&(id, _)| id != item_id)
            .take(k)
            .collect();
        tracing::debug!(item_id, hits = hits.len(), "item query");
        self.to_recommendations(hits)
    }

    fn to_recommendations(&self, hits: Vec<(ItemId, f32)>) -> Result<Vec<Recommendation>> {
        hits.into_iter()
            .map(|(item_id, distance)| -> Result<Recommendation> {
                Ok(Recommendation { item_id, title: self.snapshot.title(item_id)?.to_string(), score: distance })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmbeddingIndex, InteractionMatrix};

    /// Encodes the first word as a number on the x axis.
    struct AxisEncoder;

    impl TextEncoder for AxisEncoder {
        fn dim(&self) -> usize { 2 }

        fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let x: f32 = text
                .split_whitespace()
                .next()
                .and_then(|w| w.parse().ok())
                .ok_or_else(|| RecError::EncodingError(format!("not a number: {text:?}")))?;
            Ok(vec![x, 0.0])
        }
    }

    fn snapshot() -> Snapshot {
        let index = EmbeddingIndex::build(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0], vec![1.2, 0.0]]).unwrap();
        let titles = vec!["Origin".into(), "One".into(), "Far".into(), "Near One".into()];
        Snapshot::new(titles, index, InteractionMatrix::from_triplets(0, 4, vec![]).unwrap()).unwrap()
    }

    #[test]
    fn text_query_maps_titles_in_distance_order() {
        let snap = snapshot();
        let cbf = ContentBasedRecommender::new(&snap, &AxisEncoder);
        let recs = cbf.recommend_by_text("0.1 ignored words", 2).unwrap();
        let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Origin", "One"]);
        assert!(recs[0].score <= recs[1].score);
    }

    #[test]
    fn empty_text_is_an_encoding_error() {
        let snap = snapshot();
        let cbf = ContentBasedRecommender::new(&snap, &AxisEncoder);
        assert!(matches!(cbf.recommend_by_text("   ", 5), Err(RecError::EncodingError(_))));
        assert!(matches!(cbf.recommend_by_text("words", 5), Err(RecError::EncodingError(_))));
    }

    #[test]
    fn item_query_excludes_itself() {
        let snap = snapshot();
        let cbf = ContentBasedRecommender::new(&snap, &AxisEncoder);
        let recs = cbf.recommend_by_item(1, 2).unwrap();
        let ids: Vec<ItemId> = recs.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![3, 0]);

        let all = cbf.recommend_by_item(1, 20).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| r.item_id != 1));
    }

    #[test]
    fn unknown_item_is_reported() {
        let snap = snapshot();
        let cbf = ContentBasedRecommender::new(&snap, &AxisEncoder);
        assert!(matches!(cbf.recommend_by_item(4, 3), Err(RecError::UnknownItem { item_id: 4, .. })));
    }
}
