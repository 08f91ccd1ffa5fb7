use ml_core::{Float, MlError, Result};
use ndarray::prelude::*;

/// Row-wise log-softmax, shifted by the row maximum before exponentiating.
pub(super) fn log_softmax(scores: ArrayView2<Float>) -> Array2<Float> {
    let mut out = scores.to_owned();

    for mut row in out.rows_mut() {
        let max = row.fold(Float::NEG_INFINITY, |m, &v| m.max(v));
        row -= max;
        let log_sum = row.mapv(Float::exp).sum().ln();
        row -= log_sum;
    }

    out
}

/// Mean softmax cross-entropy of `scores` of shape `(N, C)` against labels `y`.
///
/// # Returns
/// The loss and its gradient with respect to `scores`,
/// `(softmax(scores) - onehot(y)) / N`.
///
/// # Errors
/// Returns `MlError::InvalidInput` on an empty batch, `MlError::SizeMismatch`
/// if there is not one label per row and `MlError::IndexOutOfRange` if a
/// label is not a class.
pub fn softmax_loss(
    scores: ArrayView2<Float>,
    y: ArrayView1<usize>,
) -> Result<(Float, Array2<Float>)> {
    let (n, c) = scores.dim();

    if n == 0 {
        return Err(MlError::InvalidInput("softmax loss of an empty batch"));
    }
    if y.len() != n {
        return Err(MlError::SizeMismatch {
            what: "labels",
            got: y.len(),
            expected: n,
        });
    }
    if let Some(&index) = y.iter().find(|&&label| label >= c) {
        return Err(MlError::IndexOutOfRange {
            what: "label",
            index,
            len: c,
        });
    }

    let log_probs = log_softmax(scores);
    let n = n as Float;

    let loss = -y
        .iter()
        .enumerate()
        .map(|(i, &label)| log_probs[[i, label]])
        .sum::<Float>()
        / n;

    let mut dx = log_probs.mapv(Float::exp);
    for (i, &label) in y.iter().enumerate() {
        dx[[i, label]] -= 1.;
    }
    dx /= n;

    Ok((loss, dx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::scaled_normal,
        gradient_check::{assert_gradients_close, eval_numerical_gradient},
    };
    use ml_core::generate_rng;

    #[test]
    fn uniform_scores_give_log_c() {
        let scores = Array2::zeros((50, 10));
        let y = Array1::from_iter((0..50).map(|i| i % 10));

        let (loss, _) = softmax_loss(scores.view(), y.view()).unwrap();
        assert!((loss - (10 as Float).ln()).abs() < 1e-12);
    }

    #[test]
    fn large_scores_do_not_overflow() {
        let scores = array![[1000., 0.], [0., 1000.]];
        let y = array![0, 0];

        let (loss, dx) = softmax_loss(scores.view(), y.view()).unwrap();
        assert!((loss - 500.).abs() < 1e-9);
        assert!(dx.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn invalid_labels_are_rejected() {
        let scores = Array2::zeros((2, 3));
        assert!(matches!(
            softmax_loss(scores.view(), array![0, 3].view()),
            Err(MlError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
        assert!(matches!(
            softmax_loss(scores.view(), array![0].view()),
            Err(MlError::SizeMismatch { got: 1, expected: 2, .. })
        ));
    }

    #[test]
    fn gradient_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((10, 7), 1., &mut rng);
        let y = array![0, 6, 3, 3, 1, 2, 5, 4, 0, 1];

        let dx_num =
            eval_numerical_gradient(|x| softmax_loss(x.view(), y.view()).unwrap().0, &x, 1e-5);
        let (_, dx) = softmax_loss(x.view(), y.view()).unwrap();

        assert_gradients_close(dx.view(), dx_num.view(), 1e-7);
    }
}
