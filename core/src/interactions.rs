use crate::error::{RecError, Result};
use crate::{ItemId, UserId};
use serde::{Deserialize, Serialize};

/// Read-only sparse user x item rating matrix.
///
/// Rows are kept in compressed sparse row form with item ids strictly
/// increasing inside each row. A column-major copy backs column scans.
/// Explicit zeros are never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "CsrParts", into = "CsrParts")]
pub struct InteractionMatrix {
    n_users: usize,
    n_items: usize,
    indptr: Vec<usize>,
    indices: Vec<ItemId>,
    data: Vec<f32>,
    row_norms: Vec<f32>,
    col_ptr: Vec<usize>,
    col_users: Vec<UserId>,
    col_data: Vec<f32>,
}

/// Serialized form of [`InteractionMatrix`]; derived views are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrParts {
    pub n_users: usize,
    pub n_items: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<ItemId>,
    pub data: Vec<f32>,
}

impl InteractionMatrix {
    /// Build from `(user, item, rating)` triplets. Zero ratings are dropped and
    /// duplicate cells are summed.
    pub fn from_triplets<I>(n_users: usize, n_items: usize, triplets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (UserId, ItemId, f32)>,
    {
        let mut entries: Vec<(UserId, ItemId, f32)> = Vec::new();
        for (user, item, rating) in triplets {
            if user as usize >= n_users {
                return Err(RecError::UnknownUser { user_id: user.into(), num_users: n_users });
            }
            if item as usize >= n_items {
                return Err(RecError::UnknownItem { item_id: item.into(), num_items: n_items });
            }
            check_rating(rating)?;
            if rating > 0.0 {
                entries.push((user, item, rating));
            }
        }
        entries.sort_by_key(|&(u, i, _)| (u, i));

        let mut indptr = vec![0usize; n_users + 1];
        let mut indices: Vec<ItemId> = Vec::with_capacity(entries.len());
        let mut data: Vec<f32> = Vec::with_capacity(entries.len());
        let mut last: Option<(UserId, ItemId)> = None;
        for (user, item, rating) in entries {
            if last == Some((user, item)) {
                if let Some(v) = data.last_mut() { *v += rating; }
                continue;
            }
            last = Some((user, item));
            indptr[user as usize + 1] += 1;
            indices.push(item);
            data.push(rating);
        }
        for u in 0..n_users {
            indptr[u + 1] += indptr[u];
        }
        Self::from_csr(CsrParts { n_users, n_items, indptr, indices, data })
    }

    /// Build from raw CSR arrays, validating every structural invariant.
    pub fn from_csr(parts: CsrParts) -> Result<Self> {
        let CsrParts { n_users, n_items, indptr, indices, data } = parts;
        let invalid = |msg: String| Err(RecError::InvalidInput(msg));
        let (Some(rows), Some(_)) = (n_users.checked_add(1), n_items.checked_add(1)) else {
            return invalid(format!("matrix shape {n_users} x {n_items} is too large"));
        };
        if indptr.len() != rows || indptr[0] != 0 {
            return invalid(format!("indptr must have {rows} entries starting at 0"));
        }
        if indices.len() != data.len() || indptr[n_users] != indices.len() {
            return invalid("indptr, indices and data lengths disagree".into());
        }
        if let Some(u) = indptr.windows(2).position(|w| w[0] > w[1] || w[1] > indices.len()) {
            return invalid(format!("indptr is not non-decreasing within bounds at row {u}"));
        }
        for (u, w) in indptr.windows(2).enumerate() {
            let row = &indices[w[0]..w[1]];
            if row.windows(2).any(|p| p[0] >= p[1]) {
                return invalid(format!("row {u} item ids are not strictly increasing"));
            }
            if let Some(&item) = row.last() {
                if item as usize >= n_items {
                    return Err(RecError::UnknownItem { item_id: item.into(), num_items: n_items });
                }
            }
        }
        for &rating in &data {
            check_rating(rating)?;
            if rating == 0.0 {
                return invalid("explicit zero entries are not allowed".into());
            }
        }

        let row_norms = indptr
            .windows(2)
            .map(|w| data[w[0]..w[1]].iter().map(|r| r * r).sum::<f32>().sqrt())
            .collect();

        let mut col_ptr = vec![0usize; n_items + 1];
        for &item in &indices {
            col_ptr[item as usize + 1] += 1;
        }
        for i in 0..n_items {
            col_ptr[i + 1] += col_ptr[i];
        }
        let mut next = col_ptr.clone();
        let mut col_users = vec![0 as UserId; indices.len()];
        let mut col_data = vec![0f32; indices.len()];
        for u in 0..n_users {
            for pos in indptr[u]..indptr[u + 1] {
                let slot = &mut next[indices[pos] as usize];
                col_users[*slot] = u as UserId;
                col_data[*slot] = data[pos];
                *slot += 1;
            }
        }

        Ok(Self { n_users, n_items, indptr, indices, data, row_norms, col_ptr, col_users, col_data })
    }

    pub fn n_users(&self) -> usize { self.n_users }

    pub fn n_items(&self) -> usize { self.n_items }

    /// Number of stored (nonzero) entries.
    pub fn nnz(&self) -> usize { self.data.len() }

    /// Item ids and ratings of one user's row, item ids ascending.
    pub fn row(&self, user: UserId) -> Result<(&[ItemId], &[f32])> {
        let u = user as usize;
        if u >= self.n_users {
            return Err(RecError::UnknownUser { user_id: user.into(), num_users: self.n_users });
        }
        let (start, end) = (self.indptr[u], self.indptr[u + 1]);
        Ok((&self.indices[start..end], &self.data[start..end]))
    }

    /// User ids and ratings of one item's column, user ids ascending.
    pub fn column(&self, item: ItemId) -> Result<(&[UserId], &[f32])> {
        let i = item as usize;
        if i >= self.n_items {
            return Err(RecError::UnknownItem { item_id: item.into(), num_items: self.n_items });
        }
        let (start, end) = (self.col_ptr[i], self.col_ptr[i + 1]);
        Ok((&self.col_users[start..end], &self.col_data[start..end]))
    }

    /// L2 norm of a user's rating row.
    pub fn row_norm(&self, user: UserId) -> Result<f32> {
        self.row_norms
            .get(user as usize)
            .copied()
            .ok_or(RecError::UnknownUser { user_id: user.into(), num_users: self.n_users })
    }

    /// Rating stored at (user, item), zero when absent.
    pub fn get(&self, user: UserId, item: ItemId) -> Result<f32> {
        let (items, ratings) = self.row(user)?;
        Ok(items.binary_search(&item).map(|pos| ratings[pos]).unwrap_or(0.0))
    }
}

fn check_rating(rating: f32) -> Result<()> {
    if !rating.is_finite() || rating < 0.0 {
        return Err(RecError::InvalidInput(format!("rating {rating} must be finite and non-negative")));
    }
    Ok(())
}

impl TryFrom<CsrParts> for InteractionMatrix {
    type Error = RecError;

    fn try_from(parts: CsrParts) -> Result<Self> {
        Self::from_csr(parts)
    }
}

impl From<InteractionMatrix> for CsrParts {
    fn from(m: InteractionMatrix) -> Self {
        CsrParts { n_users: m.n_users, n_items: m.n_items, indptr: m.indptr, indices: m.indices, data: m.data }
    }
}
