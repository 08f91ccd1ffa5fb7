use log::debug;
use ml_core::{
    specs::{TrainSpec, TwoLayerSpec},
    Classifier, Float, LossOutput, MlError, Result, Tensors, TrainHistory, Trainable,
};
use ndarray::prelude::*;

use crate::{arch::loss::softmax_loss, arch::scaled_normal, training::SgdTrainer};

/// The parameters, or gradients, of an `affine - relu - affine` network.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoLayerParams {
    /// First layer weights, `(D, H)`.
    pub w1: Array2<Float>,
    pub b1: Array1<Float>,
    /// Second layer weights, `(H, C)`.
    pub w2: Array2<Float>,
    pub b2: Array1<Float>,
}

impl TwoLayerParams {
    /// Returns new parameters with weights drawn from `N(0, scale²)` and zero biases.
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        num_classes: usize,
        scale: Float,
        seed: Option<u64>,
    ) -> Self {
        let mut rng = ml_core::generate_rng(seed);

        Self {
            w1: scaled_normal((input_dim, hidden_dim), scale, &mut rng),
            b1: Array1::zeros(hidden_dim),
            w2: scaled_normal((hidden_dim, num_classes), scale, &mut rng),
            b2: Array1::zeros(num_classes),
        }
    }

    /// Sum of the squares of both weight matrices.
    pub(crate) fn weight_norm_sq(&self) -> Float {
        self.w1.mapv(|w| w * w).sum() + self.w2.mapv(|w| w * w).sum()
    }
}

impl Tensors for TwoLayerParams {
    fn tensors(&self) -> Vec<ArrayViewD<'_, Float>> {
        vec![
            self.w1.view().into_dyn(),
            self.b1.view().into_dyn(),
            self.w2.view().into_dyn(),
            self.b2.view().into_dyn(),
        ]
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, Float>> {
        vec![
            self.w1.view_mut().into_dyn(),
            self.b1.view_mut().into_dyn(),
            self.w2.view_mut().into_dyn(),
            self.b2.view_mut().into_dyn(),
        ]
    }
}

/// A two-layer network whose gradients are derived in a single function,
/// trained by its own minibatch SGD loop.
///
/// The loss adds `reg · Σ W²` over both weight matrices; biases are not
/// regularized.
#[derive(Debug, Clone)]
pub struct TwoLayerNet {
    params: TwoLayerParams,
    reg: Float,
}

impl TwoLayerNet {
    /// Returns a new `TwoLayerNet` with weights drawn from `N(0, std²)`.
    pub fn new(spec: &TwoLayerSpec) -> Self {
        debug!(
            input_size = spec.input_size,
            hidden_size = spec.hidden_size,
            output_size = spec.output_size;
            "created two-layer net"
        );

        Self {
            params: TwoLayerParams::new(
                spec.input_size,
                spec.hidden_size,
                spec.output_size,
                spec.std,
                spec.seed,
            ),
            reg: 0.,
        }
    }

    /// The regularization strength used by `Classifier::loss`.
    pub fn reg(&self) -> Float {
        self.reg
    }

    /// Evaluates the network with an explicit regularization strength.
    ///
    /// # Arguments
    /// * `x` - Input of shape `(N, D)`.
    /// * `y` - Labels in `0..C`. When `None` only the scores are computed.
    /// * `reg` - The L2 regularization strength.
    ///
    /// # Errors
    /// Returns `MlError` if `x` does not have `D` features or a label is invalid.
    pub fn loss_with_reg(
        &self,
        x: ArrayView2<Float>,
        y: Option<ArrayView1<usize>>,
        reg: Float,
    ) -> Result<LossOutput<TwoLayerParams>> {
        let TwoLayerParams { w1, b1, w2, b2 } = &self.params;

        if x.ncols() != w1.nrows() {
            return Err(MlError::SizeMismatch {
                what: "input features",
                got: x.ncols(),
                expected: w1.nrows(),
            });
        }

        let hidden = (x.dot(w1) + b1).mapv(|z| z.max(0.));
        let scores = hidden.dot(w2) + b2;

        let Some(y) = y else {
            return Ok(LossOutput::Scores(scores));
        };

        let (data_loss, dscores) = softmax_loss(scores.view(), y)?;
        let loss = data_loss + reg * self.params.weight_norm_sq();

        let mut dw2 = hidden.t().dot(&dscores);
        dw2.scaled_add(2. * reg, w2);
        let db2 = dscores.sum_axis(Axis(0));

        let mut dhidden = dscores.dot(&w2.t());
        dhidden.zip_mut_with(&hidden, |d, &h| {
            if h <= 0. {
                *d = 0.;
            }
        });

        let mut dw1 = x.t().dot(&dhidden);
        dw1.scaled_add(2. * reg, w1);
        let db1 = dhidden.sum_axis(Axis(0));

        let grads = TwoLayerParams {
            w1: dw1,
            b1: db1,
            w2: dw2,
            b2: db2,
        };

        Ok(LossOutput::Loss { loss, grads })
    }

    /// Trains the network with minibatch SGD using the hyper-parameters of `spec`.
    ///
    /// The regularization strength of `spec` becomes the network's own.
    ///
    /// # Errors
    /// Returns `MlError` if the data is invalid.
    pub fn train(
        &mut self,
        x: ArrayView2<Float>,
        y: ArrayView1<usize>,
        x_val: ArrayView2<Float>,
        y_val: ArrayView1<usize>,
        spec: &TrainSpec,
    ) -> Result<TrainHistory> {
        self.reg = spec.reg;
        SgdTrainer::from_spec(spec)?.train(self, x, y, x_val, y_val)
    }
}

impl Classifier for TwoLayerNet {
    type Dim = Ix2;
    type Grads = TwoLayerParams;

    fn loss(
        &mut self,
        x: ArrayView2<'_, Float>,
        y: Option<ArrayView1<'_, usize>>,
    ) -> Result<LossOutput<TwoLayerParams>> {
        self.loss_with_reg(x, y, self.reg)
    }
}

impl Trainable for TwoLayerNet {
    type Params = TwoLayerParams;

    fn params(&self) -> &TwoLayerParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut TwoLayerParams {
        &mut self.params
    }
}
