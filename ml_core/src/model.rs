use ndarray::{Array1, Array2, ArrayView, ArrayView1, Axis, Dimension};

use crate::{Float, MlError, Result, Tensors};

/// What a `Classifier::loss` call produces.
///
/// Evaluating without labels is an inference pass and yields the raw class
/// scores; evaluating with labels is a training pass and yields the scalar loss
/// together with a freshly computed gradient record.
#[derive(Debug, Clone)]
pub enum LossOutput<G> {
    Scores(Array2<Float>),
    Loss { loss: Float, grads: G },
}

impl<G> LossOutput<G> {
    /// Returns the `(loss, grads)` pair of a training pass.
    ///
    /// # Errors
    /// Returns `MlError::InvalidInput` if this is an inference result.
    pub fn into_loss(self) -> Result<(Float, G)> {
        match self {
            LossOutput::Loss { loss, grads } => Ok((loss, grads)),
            LossOutput::Scores(_) => Err(MlError::InvalidInput(
                "expected a loss but the pass ran without labels",
            )),
        }
    }

    /// Returns the scores of an inference pass.
    ///
    /// # Errors
    /// Returns `MlError::InvalidInput` if this is a training result.
    pub fn into_scores(self) -> Result<Array2<Float>> {
        match self {
            LossOutput::Scores(scores) => Ok(scores),
            LossOutput::Loss { .. } => Err(MlError::InvalidInput(
                "expected scores but the pass ran with labels",
            )),
        }
    }
}

/// A classifier built from forward/backward primitives.
///
/// A `Classifier` owns its parameter record. The parameters are updated by an
/// external optimizer between calls to `loss`; the gradients returned by `loss`
/// are never accumulated across calls.
pub trait Classifier {
    /// Dimensionality of a minibatch of inputs, batch axis first.
    type Dim: Dimension;

    /// The gradient record, same schema as the parameter record.
    type Grads;

    /// Evaluates the classifier on a minibatch.
    ///
    /// # Arguments
    /// * `x` - The minibatch, with the batch on the first axis.
    /// * `y` - The labels. When `None`, the pass runs in inference mode and only
    ///   the scores are returned.
    ///
    /// # Errors
    /// Returns `MlError` when the inputs are invalid (e.g. a label out of range).
    fn loss(
        &mut self,
        x: ArrayView<'_, Float, Self::Dim>,
        y: Option<ArrayView1<'_, usize>>,
    ) -> Result<LossOutput<Self::Grads>>;

    /// Predicts the arg-max class of every example in `x`.
    ///
    /// # Errors
    /// Returns `MlError` when the inference pass fails.
    fn predict(&mut self, x: ArrayView<'_, Float, Self::Dim>) -> Result<Array1<usize>> {
        let scores = self.loss(x, None)?.into_scores()?;
        Ok(scores.map_axis(Axis(1), argmax))
    }
}

/// A classifier whose parameter record an external optimizer can update.
///
/// The gradient record returned by `Classifier::loss` lists its arrays in the
/// same order as `params_mut`.
pub trait Trainable: Classifier {
    type Params: Tensors;

    fn params(&self) -> &Self::Params;

    fn params_mut(&mut self) -> &mut Self::Params;
}

/// Index of the first maximum of `row`.
pub fn argmax(row: ArrayView1<'_, Float>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, Float::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn argmax_picks_first_maximum() {
        let row = array![0.5, 2.0, -1.0, 2.0];
        assert_eq!(argmax(row.view()), 1);
    }

    #[test]
    fn into_loss_rejects_scores() {
        let out: LossOutput<()> = LossOutput::Scores(Array2::zeros((1, 1)));
        assert!(out.into_loss().is_err());
    }
}
