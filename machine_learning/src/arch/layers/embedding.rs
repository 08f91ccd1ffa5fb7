use ml_core::{Float, MlError, Result};
use ndarray::prelude::*;

#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    x: Array2<usize>,
    vocab_size: usize,
}

/// Looks up the vector of every word index.
///
/// # Arguments
/// * `x` - Word indices of shape `(N, T)`, each in `0..V`.
/// * `w` - The embedding table of shape `(V, D)`.
///
/// # Returns
/// The embedded sequence of shape `(N, T, D)` and the cache.
///
/// # Errors
/// Returns `MlError::IndexOutOfRange` if an index is not a row of `w`.
pub fn forward(
    x: ArrayView2<usize>,
    w: ArrayView2<Float>,
) -> Result<(Array3<Float>, EmbeddingCache)> {
    let (n, t) = x.dim();
    let (vocab_size, d) = w.dim();

    if let Some(&index) = x.iter().find(|&&i| i >= vocab_size) {
        return Err(MlError::IndexOutOfRange {
            what: "word",
            index,
            len: vocab_size,
        });
    }

    let indices: Vec<usize> = x.iter().copied().collect();
    let out = w
        .select(Axis(0), &indices)
        .into_shape_with_order((n, t, d))?;

    let cache = EmbeddingCache {
        x: x.to_owned(),
        vocab_size,
    };

    Ok((out, cache))
}

/// Scatter-adds `dout` of shape `(N, T, D)` into a zeroed `(V, D)` table.
///
/// Gradients of repeated indices are summed.
pub fn backward(dout: ArrayView3<Float>, cache: EmbeddingCache) -> Array2<Float> {
    let EmbeddingCache { x, vocab_size } = cache;
    let mut dw = Array2::zeros((vocab_size, dout.dim().2));

    for ((n, t), &index) in x.indexed_iter() {
        let mut row = dw.row_mut(index);
        row += &dout.slice(s![n, t, ..]);
    }

    dw
}
