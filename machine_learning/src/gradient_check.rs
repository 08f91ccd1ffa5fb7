//! Centred finite-difference gradients used to validate hand-written backward passes.

use ml_core::Float;
use ndarray::{Array, ArrayView, Dimension, IntoDimension, Zip};

/// Numerically evaluates the gradient of a scalar function at `x`.
///
/// # Arguments
/// * `f` - The function to differentiate.
/// * `x` - The point at which to evaluate the gradient.
/// * `h` - The step used for the centred difference.
///
/// # Returns
/// An array shaped like `x` holding `(f(x + h) - f(x - h)) / 2h` per entry.
pub fn eval_numerical_gradient<D, F>(mut f: F, x: &Array<Float, D>, h: Float) -> Array<Float, D>
where
    D: Dimension,
    F: FnMut(&Array<Float, D>) -> Float,
{
    let mut x = x.clone();
    let mut grad = Array::zeros(x.raw_dim());

    for idx in indices(&x) {
        let old = x[idx.clone()];

        x[idx.clone()] = old + h;
        let pos = f(&x);
        x[idx.clone()] = old - h;
        let neg = f(&x);
        x[idx.clone()] = old;

        grad[idx] = (pos - neg) / (2. * h);
    }

    grad
}

/// Numerically evaluates the gradient of an array-valued function at `x`,
/// contracted with the upstream gradient `df`.
///
/// # Arguments
/// * `f` - The function to differentiate.
/// * `x` - The point at which to evaluate the gradient.
/// * `df` - The upstream gradient, shaped like the output of `f`.
/// * `h` - The step used for the centred difference.
pub fn eval_numerical_gradient_array<D, E, F>(
    mut f: F,
    x: &Array<Float, D>,
    df: &Array<Float, E>,
    h: Float,
) -> Array<Float, D>
where
    D: Dimension,
    E: Dimension,
    F: FnMut(&Array<Float, D>) -> Array<Float, E>,
{
    let mut x = x.clone();
    let mut grad = Array::zeros(x.raw_dim());

    for idx in indices(&x) {
        let old = x[idx.clone()];

        x[idx.clone()] = old + h;
        let pos = f(&x);
        x[idx.clone()] = old - h;
        let neg = f(&x);
        x[idx.clone()] = old;

        grad[idx] = ((pos - neg) * df).sum() / (2. * h);
    }

    grad
}

/// Maximum relative error between two arrays of the same shape.
pub fn rel_error<D: Dimension>(x: ArrayView<Float, D>, y: ArrayView<Float, D>) -> Float {
    Zip::from(&x).and(&y).fold(0., |max: Float, &a, &b| {
        let err = (a - b).abs() / Float::max(1e-8, a.abs() + b.abs());
        max.max(err)
    })
}

/// Maximum absolute difference between two arrays of the same shape.
pub fn max_abs_diff<D: Dimension>(x: ArrayView<Float, D>, y: ArrayView<Float, D>) -> Float {
    Zip::from(&x)
        .and(&y)
        .fold(0., |max: Float, &a, &b| max.max((a - b).abs()))
}

/// Panics unless `analytic` matches `numeric` within a relative error of `tol`.
///
/// Entries whose magnitude is at the level of the finite-difference noise make
/// the relative error meaningless, so an absolute difference below `1e-8` is
/// accepted as well.
pub fn assert_gradients_close<D: Dimension>(
    analytic: ArrayView<Float, D>,
    numeric: ArrayView<Float, D>,
    tol: Float,
) {
    assert_eq!(analytic.shape(), numeric.shape(), "gradient shapes differ");

    let rel = rel_error(analytic.view(), numeric.view());
    let abs = max_abs_diff(analytic.view(), numeric.view());
    assert!(
        rel < tol || abs < 1e-8,
        "gradient mismatch: rel error {rel:e}, abs error {abs:e}"
    );
}

fn indices<D: Dimension>(x: &Array<Float, D>) -> Vec<D> {
    x.indexed_iter()
        .map(|(idx, _)| idx.into_dimension())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn numerical_gradient_of_quadratic() {
        let x = array![1., -2., 3.];
        let grad = eval_numerical_gradient(|x| x.mapv(|v| v * v).sum(), &x, 1e-5);
        let expected = array![2., -4., 6.];
        assert!(rel_error(grad.view(), expected.view()) < 1e-8);
    }

    #[test]
    fn numerical_gradient_array_contracts_upstream() {
        let x = array![[1., 2.], [3., 4.]];
        let df = array![[1., 0.], [0., 2.]];
        let grad = eval_numerical_gradient_array(|x| x.mapv(|v| 3. * v), &x, &df, 1e-5);
        let expected = array![[3., 0.], [0., 6.]];
        assert!(rel_error(grad.view(), expected.view()) < 1e-8);
    }

    #[test]
    fn rel_error_of_equal_arrays_is_zero() {
        let x = array![0., 1., -5.];
        assert_eq!(rel_error(x.view(), x.view()), 0.);
    }
}
