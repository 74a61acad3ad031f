use crate::error::{RecError, Result};
use crate::{EmbeddingIndex, InteractionMatrix, ItemId};

/// Immutable bundle of everything a query reads: item titles, the embedding
/// index and the rating matrix. Item ids index all three consistently.
#[derive(Debug)]
pub struct Snapshot {
    titles: Vec<String>,
    index: EmbeddingIndex,
    ratings: InteractionMatrix,
}

impl Snapshot {
    pub fn new(titles: Vec<String>, index: EmbeddingIndex, ratings: InteractionMatrix) -> Result<Self> {
        if index.len() != titles.len() {
            return Err(RecError::InvalidSnapshot(format!(
                "{} titles but {} embeddings",
                titles.len(),
                index.len()
            )));
        }
        if ratings.n_items() != titles.len() {
            return Err(RecError::InvalidSnapshot(format!(
                "{} titles but rating matrix has {} item columns",
                titles.len(),
                ratings.n_items()
            )));
        }
        tracing::info!(
            items = titles.len(),
            users = ratings.n_users(),
            ratings = ratings.nnz(),
            dim = index.dim(),
            "snapshot ready"
        );
        Ok(Self { titles, index, ratings })
    }

    pub fn num_items(&self) -> usize { self.titles.len() }

    pub fn titles(&self) -> &[String] { &self.titles }

    pub fn index(&self) -> &EmbeddingIndex { &self.index }

    pub fn ratings(&self) -> &InteractionMatrix { &self.ratings }

    pub fn title(&self, item_id: ItemId) -> Result<&str> {
        self.titles
            .get(item_id as usize)
            .map(String::as_str)
            .ok_or(RecError::UnknownItem { item_id: item_id.into(), num_items: self.titles.len() })
    }
}
