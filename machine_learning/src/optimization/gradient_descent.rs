use ml_core::Float;
use ndarray::{ArrayViewD, ArrayViewMutD};

use super::Optimizer;

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: Float,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: Float) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> Float {
        self.learning_rate
    }

    /// Scales the learning rate by `factor`.
    pub fn decay(&mut self, factor: Float) {
        self.learning_rate *= factor;
    }
}

impl Optimizer for GradientDescent {
    /// Updates the parameters according to the algorithm's learning rule, that is, making a step in
    /// the opposite direction of the gradient, with a length of `learning_rate`.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient used for taking the step.
    fn update_params(&mut self, mut params: ArrayViewMutD<Float>, grad: ArrayViewD<Float>) {
        params.scaled_add(-self.learning_rate, &grad);
    }
}
