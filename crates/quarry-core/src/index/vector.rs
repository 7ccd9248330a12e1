//! Embedding seam and flat inner-product vector index.
//!
//! The embedding model is an external collaborator behind the [`Embedder`]
//! trait; the store only assumes query and fragment vectors share one space.
//! Fragment vectors are unit-normalized at build time, so inner product
//! equals cosine similarity.

use serde::{Deserialize, Serialize};

use crate::errors::QuarryResult;

/// Embeds texts into a fixed-dimension vector space.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>>;
}

/// Exhaustive inner-product index over row-ordered vectors.
///
/// Row order must match the fragment file; that correspondence is the only
/// link between a vector and its fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatIndex {
    pub dim: usize,
    pub vectors: Vec<Vec<f32>>,
}

pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

impl FlatIndex {
    pub fn build(mut vectors: Vec<Vec<f32>>) -> Self {
        let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
        for vector in &mut vectors {
            normalize(vector);
        }
        Self { dim, vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top `k` rows by inner product with the (normalized) query vector,
    /// ties broken by lower row index.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.is_empty() || query.len() != self.dim {
            return Vec::new();
        }
        let mut normalized = query.to_vec();
        normalize(&mut normalized);
        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let score = row
                    .iter()
                    .zip(normalized.iter())
                    .map(|(a, b)| a * b)
                    .sum::<f32>();
                (index, score)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}

// ---------------------------------------------------------------------------
// Optional fastembed-backed embedder
// ---------------------------------------------------------------------------

#[cfg(feature = "fastembed")]
pub mod backend {
    //! Embedding backend built on `fastembed`, enabled by the `fastembed`
    //! cargo feature.

    use parking_lot::Mutex;

    use super::Embedder;
    use crate::errors::{QuarryError, QuarryResult};

    pub struct FastEmbedder {
        // Guarded so the handle is Sync regardless of the model's receiver.
        model: Mutex<fastembed::TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn new() -> QuarryResult<Self> {
            let model = fastembed::TextEmbedding::try_new(Default::default())
                .map_err(|e| QuarryError::Model(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(model),
            })
        }
    }

    impl Embedder for FastEmbedder {
        fn embed(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>> {
            let mut model = self.model.lock();
            model
                .embed(texts.to_vec(), None)
                .map_err(|e| QuarryError::Model(e.to_string()))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::default();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_dimension_mismatch_returns_nothing() {
        let index = FlatIndex::build(vec![vec![1.0, 0.0]]);
        assert!(index.search(&[1.0, 0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_nearest_neighbor_order() {
        let index = FlatIndex::build(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.7, 0.7],
        ]);
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 2);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn test_vectors_normalized_at_build() {
        // Same direction, wildly different magnitudes: scores must match.
        let index = FlatIndex::build(vec![vec![100.0, 0.0], vec![0.001, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 2);
        assert!((hits[0].1 - hits[1].1).abs() < 1e-6);
    }

    #[test]
    fn test_serde_round_trip() {
        let index = FlatIndex::build(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let raw = serde_json::to_string(&index).unwrap();
        let back: FlatIndex = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.dim, 2);
        assert_eq!(back.vectors, index.vectors);
    }
}
