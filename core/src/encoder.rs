use crate::error::{RecError, Result};
use crate::tokenizer::terms;
use sha1::{Digest, Sha1};

/// Turns free text into a single fixed-dimension vector.
///
/// Implementations must be deterministic and free of side effects so callers
/// can retry them on transient failure.
pub trait TextEncoder: Send + Sync {
    fn dim(&self) -> usize;

    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Signed feature-hashing encoder over normalized, stemmed terms.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dim: usize,
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(RecError::InvalidInput("encoder dimension must be at least 1".into()));
        }
        Ok(Self { dim })
    }
}

impl TextEncoder for HashingEncoder {
    fn dim(&self) -> usize { self.dim }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let terms = terms(text);
        if terms.is_empty() {
            return Err(RecError::EncodingError("no encodable terms in text".into()));
        }
        let mut v = vec![0f32; self.dim];
        for term in &terms {
            let digest = Sha1::digest(term.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(bucket) % self.dim as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        // Opposite-signed collisions can cancel out completely.
        if norm == 0.0 {
            return Err(RecError::EncodingError("terms cancelled to a zero vector".into()));
        }
        v.iter_mut().for_each(|x| *x /= norm);
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_unit_length() {
        let enc = HashingEncoder::new(64).unwrap();
        let a = enc.encode("A tale of dragons and wizards").unwrap();
        let b = enc.encode("A tale of dragons and wizards").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn stopword_only_text_fails() {
        let enc = HashingEncoder::new(8).unwrap();
        assert!(matches!(enc.encode("the and of"), Err(RecError::EncodingError(_))));
        assert!(matches!(enc.encode(""), Err(RecError::EncodingError(_))));
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(HashingEncoder::new(0).is_err());
    }
}
