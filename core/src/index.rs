use crate::error::{RecError, Result};
use crate::ItemId;
use std::cmp::Ordering;

/// Exact Euclidean k-NN index over a fixed, ordered set of item embeddings.
///
/// Vectors are stored row-major in one contiguous buffer; the row number of a
/// vector is its item id.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingIndex {
    /// Build the index over `vectors`. All vectors must share one non-zero dimension.
    pub fn build<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::default());
        };
        let dim = first.as_ref().len();
        if dim == 0 {
            return Err(RecError::InvalidInput("embeddings must have at least one dimension".into()));
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for (row, v) in vectors.iter().enumerate() {
            let v = v.as_ref();
            if v.len() != dim {
                return Err(RecError::DimensionMismatch { expected: dim, actual: v.len() });
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(RecError::InvalidInput(format!("embedding {row} has a non-finite component")));
            }
            data.extend_from_slice(v);
        }
        tracing::debug!(size = vectors.len(), dim, "built embedding index");
        Ok(Self { dim, data })
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn dim(&self) -> usize { self.dim }

    /// Stored embedding of `item_id`.
    pub fn vector(&self, item_id: ItemId) -> Result<&[f32]> {
        let row = item_id as usize;
        if row >= self.len() {
            return Err(RecError::UnknownItem { item_id: item_id.into(), num_items: self.len() });
        }
        Ok(&self.data[row * self.dim..(row + 1) * self.dim])
    }

    /// The `k` nearest items to `vector`, nearest first, ties by ascending id.
    /// `k` larger than the index is clamped to its size.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(ItemId, f32)>> {
        if self.is_empty() {
            return Err(RecError::EmptyIndex);
        }
        if k == 0 {
            return Err(RecError::InvalidInput("k must be at least 1".into()));
        }
        if vector.len() != self.dim {
            return Err(RecError::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }

        let mut scored: Vec<(ItemId, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(row, v)| (row as ItemId, squared_distance(v, vector)))
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, nearest_first);
            scored.truncate(k);
        }
        scored.sort_by(nearest_first);
        Ok(scored.into_iter().map(|(id, d2)| (id, d2.sqrt())).collect())
    }
}

fn nearest_first(a: &(ItemId, f32), b: &(ItemId, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

#[inline]
fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
