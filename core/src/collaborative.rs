use crate::error::Result;
use crate::{InteractionMatrix, ItemId, UserId};
use std::collections::HashMap;

/// User-based neighborhood collaborative filtering.
///
/// Similarity is cosine over full rating rows. Only users sharing at least one
/// rated item with the context user (strictly positive similarity) qualify as
/// neighbors. An item's score is the similarity-weighted sum of the
/// neighbors' ratings for it.
pub struct CollaborativeRecommender<'a> {
    ratings: &'a InteractionMatrix,
}

impl<'a> CollaborativeRecommender<'a> {
    pub fn new(ratings: &'a InteractionMatrix) -> Self {
        Self { ratings }
    }

    /// Up to `k` users most similar to `context`, most similar first,
    /// ties by ascending user id.
    pub fn neighbors(&self, context: UserId, k: usize) -> Result<Vec<(UserId, f32)>> {
        let (items, ratings) = self.ratings.row(context)?;
        let context_norm = self.ratings.row_norm(context)?;
        if k == 0 || context_norm == 0.0 {
            return Ok(Vec::new());
        }

        let mut dots: HashMap<UserId, f32> = HashMap::new();
        for (&item, &r) in items.iter().zip(ratings) {
            let (users, col) = self.ratings.column(item)?;
            for (&user, &other) in users.iter().zip(col) {
                if user != context {
                    *dots.entry(user).or_insert(0.0) += r * other;
                }
            }
        }

        let mut sims: Vec<(UserId, f32)> = Vec::with_capacity(dots.len());
        for (user, dot) in dots {
            let sim = dot / (context_norm * self.ratings.row_norm(user)?);
            if sim > 0.0 {
                sims.push((user, sim));
            }
        }
        sims.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        sims.truncate(k);
        Ok(sims)
    }

    /// Top `m` unrated items for `context` scored from its `k` nearest
    /// neighbors, as `(score, item_id)` with the highest score first.
    pub fn get_top_m_recs_k_neighbors(&self, context: UserId, k: usize, m: usize) -> Result<Vec<(f32, ItemId)>> {
        let neighbors = self.neighbors(context, k)?;
        let (seen, _) = self.ratings.row(context)?;

        let mut scores: HashMap<ItemId, f32> = HashMap::new();
        for &(user, sim) in &neighbors {
            let (items, ratings) = self.ratings.row(user)?;
            for (&item, &r) in items.iter().zip(ratings) {
                if seen.binary_search(&item).is_err() {
                    *scores.entry(item).or_insert(0.0) += sim * r;
                }
            }
        }

        let mut ranked: Vec<(f32, ItemId)> = scores.into_iter().map(|(item, s)| (s, item)).collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked.truncate(m);
        tracing::debug!(context, neighbors = neighbors.len(), recs = ranked.len(), "collaborative query");
        Ok(ranked)
    }
}
