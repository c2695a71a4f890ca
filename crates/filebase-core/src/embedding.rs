//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helpers for vector serialization and similarity.
//!
//! Concrete providers (OpenAI, Ollama) live in the `filebase` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::CatalogError;

/// Trait for embedding providers.
///
/// Implementations are created by the application and passed explicitly to
/// the ingestion pipeline and search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text. Failures are treated as retryable by callers.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use filebase_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Trailing partial values are
/// ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Euclidean norm, accumulated in `f64` so that neither very small nor
/// very large `f32` components underflow or overflow.
pub fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Check a freshly produced embedding before it is stored.
///
/// Rejects a wrong dimensionality, and rejects zero-norm or non-finite
/// vectors as [`CatalogError::EmptyVector`]: similarity against them is
/// undefined.
pub fn validate_embedding(v: &[f32], expected_dims: usize) -> Result<(), CatalogError> {
    if expected_dims > 0 && v.len() != expected_dims {
        return Err(CatalogError::DimensionMismatch {
            expected: expected_dims,
            actual: v.len(),
        });
    }
    if v.iter().any(|x| !x.is_finite()) || !(norm(v) > 0.0) {
        return Err(CatalogError::EmptyVector);
    }
    Ok(())
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// Sums are accumulated in `f64`, so `sim(a, a) == 1` holds for any
/// non-zero finite `f32` vector regardless of magnitude.
///
/// Fails with [`CatalogError::EmptyVector`] when either operand has zero
/// norm (including empty vectors) or a non-finite component, and with
/// [`CatalogError::DimensionMismatch`] when lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, CatalogError> {
    if a.len() != b.len() {
        return Err(CatalogError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let finite = dot.is_finite() && norm_a.is_finite() && norm_b.is_finite();
    if !(finite && norm_a > 0.0 && norm_b > 0.0) {
        return Err(CatalogError::EmptyVector);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32)
}
