//! # Vector Utilities
//!
//! Shape normalization, unit normalization and cosine similarity for
//! embedding vectors. Pure functions, no state.
//!
//! ## Tensor Shapes:
//! Embedding models hand back one of a few layouts. Sentence models usually
//! return one vector per token (`[sequence_length, hidden_size]`), sometimes
//! wrapped in a batch axis of size one. `flatten` reduces all of them to a
//! single `hidden_size` vector by mean-pooling over the sequence axis, so the
//! result does not depend on how many tokens the text produced.

use crate::intent::error::{EngineError, EngineResult};

/// Guard against division by zero when one of the vectors is all zeros.
const NORM_EPSILON: f32 = 1e-10;

/// Raw output of an embedding backend.
///
/// Backends must declare which layout they produce. Anything that does not
/// fit one of these variants is rejected by [`flatten`] instead of guessed at.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTensor {
    /// Already a single vector.
    Flat(Vec<f32>),
    /// Nested sequences, e.g. `[[[f32; hidden]; seq]; 1]`.
    Nested(Vec<RawTensor>),
    /// Row-major buffer of `rows` token vectors, each `cols` long.
    RowMajor2D { data: Vec<f32>, rows: usize, cols: usize },
}

/// Collapse a raw backend tensor into one vector.
///
/// ## Rules:
/// - `Flat` passes through unchanged
/// - `RowMajor2D` is mean-pooled across rows
/// - `Nested` with a single child recurses into it (batch of one)
/// - `Nested` whose children are all equal-length `Flat` rows is mean-pooled
///
/// Every other shape fails with `MalformedEmbeddingOutput`.
pub fn flatten(raw: RawTensor) -> EngineResult<Vec<f32>> {
    let vector = match raw {
        RawTensor::Flat(values) => values,
        RawTensor::RowMajor2D { data, rows, cols } => mean_pool(&data, rows, cols)?,
        RawTensor::Nested(children) => flatten_nested(children)?,
    };

    if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
        return Err(EngineError::MalformedEmbeddingOutput(format!(
            "non-finite value at index {}",
            index
        )));
    }

    Ok(vector)
}

fn flatten_nested(mut children: Vec<RawTensor>) -> EngineResult<Vec<f32>> {
    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return flatten(only);
        }
    }

    if children.is_empty() {
        return Err(EngineError::MalformedEmbeddingOutput(
            "nested tensor has no elements".to_string(),
        ));
    }

    let rows = children.len();
    let mut cols = None;
    let mut data = Vec::new();

    for (row, child) in children.into_iter().enumerate() {
        let values = match child {
            RawTensor::Flat(values) => values,
            other => {
                return Err(EngineError::MalformedEmbeddingOutput(format!(
                    "row {} of a {}-row tensor is not a flat vector ({})",
                    row,
                    rows,
                    shape_name(&other)
                )));
            }
        };

        match cols {
            None => cols = Some(values.len()),
            Some(expected) if expected != values.len() => {
                return Err(EngineError::MalformedEmbeddingOutput(format!(
                    "ragged rows: row {} has {} values, expected {}",
                    row,
                    values.len(),
                    expected
                )));
            }
            Some(_) => {}
        }

        data.extend(values);
    }

    mean_pool(&data, rows, cols.unwrap_or(0))
}

/// Average `rows` consecutive vectors of length `cols`.
fn mean_pool(data: &[f32], rows: usize, cols: usize) -> EngineResult<Vec<f32>> {
    if rows == 0 || cols == 0 {
        return Err(EngineError::MalformedEmbeddingOutput(format!(
            "empty tensor of shape [{}, {}]",
            rows, cols
        )));
    }

    match rows.checked_mul(cols) {
        Some(expected) if expected == data.len() => {}
        _ => {
            return Err(EngineError::MalformedEmbeddingOutput(format!(
                "buffer of {} values does not match shape [{}, {}]",
                data.len(),
                rows,
                cols
            )));
        }
    }

    let mut pooled = vec![0.0f32; cols];
    for row in data.chunks_exact(cols) {
        for (sum, value) in pooled.iter_mut().zip(row) {
            *sum += value;
        }
    }

    let scale = rows as f32;
    for value in pooled.iter_mut() {
        *value /= scale;
    }

    Ok(pooled)
}

fn shape_name(tensor: &RawTensor) -> &'static str {
    match tensor {
        RawTensor::Flat(_) => "flat",
        RawTensor::Nested(_) => "nested",
        RawTensor::RowMajor2D { .. } => "row-major 2D",
    }
}

/// Euclidean norm of a vector.
pub fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length. A zero vector is returned unchanged.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude = norm(&vector);
    if magnitude > 0.0 {
        let inverse = magnitude.recip();
        for value in vector.iter_mut() {
            *value *= inverse;
        }
    }
    vector
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns `0.0` when either vector is empty or all zeros, and fails when
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> EngineResult<f32> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    if a.is_empty() {
        return Ok(0.0);
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let denominator = (norm(a) * norm(b)).max(NORM_EPSILON);

    Ok((dot / denominator).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_flatten_passes_flat_through() {
        let raw = RawTensor::Flat(vec![0.5, -1.0, 2.0]);
        assert_eq!(flatten(raw).unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_flatten_mean_pools_row_major() {
        // Shape [3, 4], row r filled with r
        let data: Vec<f32> = (1..=3).flat_map(|r| vec![r as f32; 4]).collect();
        let raw = RawTensor::RowMajor2D { data, rows: 3, cols: 4 };
        assert_eq!(flatten(raw).unwrap(), vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_flatten_nested_batch_of_one() {
        let raw = RawTensor::Nested(vec![RawTensor::Nested(vec![
            RawTensor::Flat(vec![1.0, 4.0]),
            RawTensor::Flat(vec![3.0, 0.0]),
        ])]);
        assert_eq!(flatten(raw).unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_flatten_rejects_bad_shapes() {
        let ragged = RawTensor::Nested(vec![
            RawTensor::Flat(vec![1.0, 2.0]),
            RawTensor::Flat(vec![1.0]),
        ]);
        assert!(matches!(flatten(ragged), Err(EngineError::MalformedEmbeddingOutput(_))));

        let wrong_len = RawTensor::RowMajor2D { data: vec![1.0; 5], rows: 2, cols: 3 };
        assert!(matches!(flatten(wrong_len), Err(EngineError::MalformedEmbeddingOutput(_))));

        let no_rows = RawTensor::RowMajor2D { data: vec![], rows: 0, cols: 384 };
        assert!(matches!(flatten(no_rows), Err(EngineError::MalformedEmbeddingOutput(_))));

        let empty = RawTensor::Nested(vec![]);
        assert!(matches!(flatten(empty), Err(EngineError::MalformedEmbeddingOutput(_))));

        let batch_of_two = RawTensor::Nested(vec![
            RawTensor::Nested(vec![RawTensor::Flat(vec![1.0])]),
            RawTensor::Nested(vec![RawTensor::Flat(vec![2.0])]),
        ]);
        assert!(matches!(flatten(batch_of_two), Err(EngineError::MalformedEmbeddingOutput(_))));
    }

    #[test]
    fn test_flatten_rejects_non_finite() {
        let raw = RawTensor::Flat(vec![1.0, f32::NAN]);
        assert!(matches!(flatten(raw), Err(EngineError::MalformedEmbeddingOutput(_))));
    }

    #[test]
    fn test_normalize_known_vector() {
        let v = normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        assert_eq!(normalize(vec![0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
        assert!(normalize(vec![]).is_empty());
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert_eq!(
            cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]),
            Err(EngineError::DimensionMismatch { left: 2, right: 3 })
        );
        let opposite = cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]).unwrap();
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    fn non_zero_vector() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-100.0f32..100.0, 1..64).prop_filter("non-zero", |v| norm(v) > 1e-3)
    }

    fn equal_length_pair() -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
        (1usize..64).prop_flat_map(|len| {
            (
                prop::collection::vec(-100.0f32..100.0, len),
                prop::collection::vec(-100.0f32..100.0, len),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_normalized_vectors_have_unit_norm(v in non_zero_vector()) {
            let n = norm(&normalize(v));
            prop_assert!((n - 1.0).abs() < 1e-4);
        }

        #[test]
        fn prop_self_similarity_is_one(v in non_zero_vector()) {
            let s = cosine_similarity(&v, &v).unwrap();
            prop_assert!((s - 1.0).abs() < 1e-4);
        }

        #[test]
        fn prop_similarity_is_symmetric((a, b) in equal_length_pair()) {
            let ab = cosine_similarity(&a, &b).unwrap();
            let ba = cosine_similarity(&b, &a).unwrap();
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!((-1.0..=1.0).contains(&ab));
        }
    }
}
