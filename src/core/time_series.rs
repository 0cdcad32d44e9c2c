use serde::{Deserialize, Serialize};

use crate::error::{Result, RqaError};

/// Time-delay embedding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    /// Embedding dimension `m`.
    pub dimension: usize,
    /// Time delay `tau`.
    pub delay: usize,
}

impl EmbeddingParams {
    pub fn new(dimension: usize, delay: usize) -> Self {
        Self { dimension, delay }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RqaError::InvalidEmbedding(
                "embedding dimension must be >= 1".into(),
            ));
        }
        if self.delay == 0 {
            return Err(RqaError::InvalidEmbedding("time delay must be >= 1".into()));
        }
        Ok(())
    }

    /// Number of samples spanned by one embedded vector: `(m - 1) * tau + 1`.
    pub fn span(&self) -> usize {
        (self.dimension - 1) * self.delay + 1
    }
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Read-only view of a series that yields embedded vectors on demand.
///
/// Built either from scalar samples plus [`EmbeddingParams`] or from vectors
/// that are already embedded. In both cases component `k` of vector `i`
/// lives at `data[i * stride + k * delay]`, so no embedded copy is ever
/// materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesView {
    data: Vec<f32>,
    dimension: usize,
    delay: usize,
    stride: usize,
    n_vectors: usize,
}

impl TimeSeriesView {
    /// Build a time-delay embedded view over scalar samples.
    ///
    /// ```
    /// use rqa_rs::{EmbeddingParams, TimeSeriesView};
    ///
    /// let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    /// let ts = TimeSeriesView::from_samples(samples, EmbeddingParams::new(2, 2)).unwrap();
    /// assert_eq!(ts.number_of_vectors(), 3);
    /// assert_eq!(ts.vector(1), vec![2.0, 4.0]);
    /// ```
    pub fn from_samples(samples: Vec<f32>, params: EmbeddingParams) -> Result<Self> {
        params.validate()?;
        let required = params.span();
        if samples.len() < required {
            return Err(RqaError::SeriesTooShort {
                samples: samples.len(),
                required,
            });
        }
        let n_vectors = samples.len() - required + 1;
        Ok(Self {
            data: samples,
            dimension: params.dimension,
            delay: params.delay,
            stride: 1,
            n_vectors,
        })
    }

    /// Build a view over vectors that are already embedded.
    ///
    /// All vectors must share the same non-zero dimension.
    pub fn from_vectors(vectors: &[Vec<f32>]) -> Result<Self> {
        let first = vectors.first().ok_or(RqaError::SeriesTooShort {
            samples: 0,
            required: 1,
        })?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(RqaError::InvalidEmbedding(
                "embedded vectors must have at least one component".into(),
            ));
        }
        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for v in vectors {
            if v.len() != dimension {
                return Err(RqaError::DimensionMismatch {
                    expected: dimension,
                    actual: v.len(),
                });
            }
            data.extend_from_slice(v);
        }
        Ok(Self {
            data,
            dimension,
            delay: 1,
            stride: dimension,
            n_vectors: vectors.len(),
        })
    }

    pub fn number_of_vectors(&self) -> usize {
        self.n_vectors
    }

    pub fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    pub fn time_delay(&self) -> usize {
        self.delay
    }

    /// Component `k` of vector `i`.
    #[inline]
    pub fn component(&self, i: usize, k: usize) -> f32 {
        self.data[i * self.stride + k * self.delay]
    }

    /// Copy embedded vector `i`.
    pub fn vector(&self, i: usize) -> Vec<f32> {
        (0..self.dimension).map(|k| self.component(i, k)).collect()
    }

    /// Append vectors `start..start + count` to `out` in vector-major order.
    ///
    /// This is the host-side staging step before a tile's vectors are
    /// transferred to the device.
    pub fn write_vectors(&self, start: usize, count: usize, out: &mut Vec<f32>) {
        debug_assert!(start + count <= self.n_vectors);
        out.reserve(count * self.dimension);
        for i in start..start + count {
            for k in 0..self.dimension {
                out.push(self.component(i, k));
            }
        }
    }

    /// Embedded vectors `start..start + count`, flattened.
    pub fn embedded_slice(&self, start: usize, count: usize) -> Vec<f32> {
        let mut out = Vec::new();
        self.write_vectors(start, count, &mut out);
        out
    }
}
