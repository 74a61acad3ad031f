use serde::{Deserialize, Serialize};

pub mod collaborative;
pub mod content;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod index;
pub mod interactions;
pub mod persist;
pub mod sample;
pub mod snapshot;
pub mod tokenizer;

pub use collaborative::CollaborativeRecommender;
pub use content::ContentBasedRecommender;
pub use encoder::{HashingEncoder, TextEncoder};
pub use engine::{EngineConfig, RecommendationEngine};
pub use error::{RecError, Result};
pub use index::EmbeddingIndex;
pub use interactions::InteractionMatrix;
pub use sample::SampleSelector;
pub use snapshot::Snapshot;

pub type ItemId = u32;
pub type UserId = u32;

/// One ranked entry of a recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub title: String,
    /// Distance for content-based results, aggregated rating for collaborative ones.
    pub score: f32,
}

/// A raw (user, item, rating) triple drawn for cold-start display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledRating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub title: String,
    pub rating: f32,
}
