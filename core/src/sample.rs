use crate::error::{RecError, Result};
use crate::{ItemId, SampledRating, Snapshot};
use rand::Rng;

/// Draws raw ratings for a handful of random items, used to seed a cold-start view.
/// Item column 0 is a reserved sentinel and never sampled.
pub struct SampleSelector<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> SampleSelector<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    /// Number of columns eligible for sampling.
    pub fn available_columns(&self) -> usize {
        self.snapshot.ratings().n_items().saturating_sub(1)
    }

    pub fn sample_users(&self, k: usize) -> Result<Vec<SampledRating>> {
        self.sample_users_with(k, &mut rand::thread_rng())
    }

    /// Sample `k` distinct item columns with `rng` and return every stored
    /// rating in them, column by column in draw order.
    pub fn sample_users_with<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Result<Vec<SampledRating>> {
        let available = self.available_columns();
        if k > available {
            return Err(RecError::InsufficientColumns { requested: k, available });
        }
        let ratings = self.snapshot.ratings();
        let mut out = Vec::new();
        for col in rand::seq::index::sample(rng, available, k).into_iter() {
            let item_id = (col + 1) as ItemId;
            let title = self.snapshot.title(item_id)?;
            let (users, values) = ratings.column(item_id)?;
            out.extend(users.iter().zip(values).map(|(&user_id, &rating)| SampledRating {
                user_id,
                item_id,
                title: title.to_string(),
                rating,
            }));
        }
        tracing::debug!(columns = k, ratings = out.len(), "sampled ratings");
        Ok(out)
    }
}
