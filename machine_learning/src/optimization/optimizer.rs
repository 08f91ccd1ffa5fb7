use ml_core::{Float, Tensors};
use ndarray::{ArrayViewD, ArrayViewMutD};

/// An update rule applied to a parameter record with a gradient record of the same schema.
pub trait Optimizer {
    /// Updates a single parameter array in place with its gradient.
    fn update_params(&mut self, params: ArrayViewMutD<Float>, grad: ArrayViewD<Float>);

    /// Updates every array of `params` with the matching array of `grads`.
    ///
    /// Both records must list their arrays in the same order.
    fn step<P: Tensors, G: Tensors>(&mut self, params: &mut P, grads: &G)
    where
        Self: Sized,
    {
        for (p, g) in params.tensors_mut().into_iter().zip(grads.tensors()) {
            self.update_params(p, g);
        }
    }
}
