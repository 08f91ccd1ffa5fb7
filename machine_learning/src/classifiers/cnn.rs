use log::debug;
use ml_core::{
    generate_rng, specs::ConvNetSpec, Classifier, Float, LossOutput, MlError, Result, Tensors,
    Trainable,
};
use ndarray::prelude::*;

use crate::arch::{
    layers::{affine, conv, pool, relu, ConvParam, PoolParam},
    loss::softmax_loss,
    scaled_normal,
};

/// The parameters, or gradients, of a `ThreeLayerConvNet`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvNetParams {
    /// Filters, `(F, C, HH, WW)`.
    pub w1: Array4<Float>,
    pub b1: Array1<Float>,
    /// Hidden affine weights, `(F · H/2 · W/2, hidden)`.
    pub w2: Array2<Float>,
    pub b2: Array1<Float>,
    /// Output affine weights, `(hidden, classes)`.
    pub w3: Array2<Float>,
    pub b3: Array1<Float>,
}

impl ConvNetParams {
    fn weight_norm_sq(&self) -> Float {
        self.w1.mapv(|w| w * w).sum()
            + self.w2.mapv(|w| w * w).sum()
            + self.w3.mapv(|w| w * w).sum()
    }
}

impl Tensors for ConvNetParams {
    fn tensors(&self) -> Vec<ArrayViewD<'_, Float>> {
        vec![
            self.w1.view().into_dyn(),
            self.b1.view().into_dyn(),
            self.w2.view().into_dyn(),
            self.b2.view().into_dyn(),
            self.w3.view().into_dyn(),
            self.b3.view().into_dyn(),
        ]
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, Float>> {
        vec![
            self.w1.view_mut().into_dyn(),
            self.b1.view_mut().into_dyn(),
            self.w2.view_mut().into_dyn(),
            self.b2.view_mut().into_dyn(),
            self.w3.view_mut().into_dyn(),
            self.b3.view_mut().into_dyn(),
        ]
    }
}

/// A `conv - relu - 2x2 max pool - affine - relu - affine - softmax` network.
///
/// The convolution uses stride 1 and `(filter_size - 1) / 2` zero padding so
/// it preserves the spatial size of its input.
#[derive(Debug, Clone)]
pub struct ThreeLayerConvNet {
    params: ConvNetParams,
    input_dim: (usize, usize, usize),
    conv_param: ConvParam,
    pool_param: PoolParam,
    reg: Float,
}

impl ThreeLayerConvNet {
    /// Returns a new `ThreeLayerConvNet` shaped by `spec`.
    ///
    /// # Errors
    /// Returns `MlError::InvalidInput` if the filter size is even or the input
    /// cannot be pooled into 2x2 windows.
    pub fn new(spec: &ConvNetSpec) -> Result<Self> {
        let (c, h, w) = spec.input_dim;
        let fs = spec.filter_size;

        if fs % 2 == 0 {
            return Err(MlError::InvalidInput("filter size must be odd"));
        }
        if h == 0 || w == 0 || h % 2 != 0 || w % 2 != 0 {
            return Err(MlError::InvalidInput("input height and width must be even"));
        }

        let mut rng = generate_rng(spec.seed);
        let scale = spec.weight_scale;
        let (f, hidden) = (spec.num_filters, spec.hidden_dim);
        let pooled = f * (h / 2) * (w / 2);

        let params = ConvNetParams {
            w1: scaled_normal((f, c, fs, fs), scale, &mut rng),
            b1: Array1::zeros(f),
            w2: scaled_normal((pooled, hidden), scale, &mut rng),
            b2: Array1::zeros(hidden),
            w3: scaled_normal((hidden, spec.num_classes), scale, &mut rng),
            b3: Array1::zeros(spec.num_classes),
        };

        debug!(
            num_filters = f,
            filter_size = fs,
            hidden_dim = hidden,
            num_classes = spec.num_classes;
            "created three-layer conv net"
        );

        Ok(Self {
            params,
            input_dim: spec.input_dim,
            conv_param: ConvParam {
                stride: 1,
                pad: (fs - 1) / 2,
            },
            pool_param: PoolParam::default(),
            reg: spec.reg,
        })
    }
}

impl Classifier for ThreeLayerConvNet {
    type Dim = Ix4;
    type Grads = ConvNetParams;

    fn loss(
        &mut self,
        x: ArrayView4<'_, Float>,
        y: Option<ArrayView1<'_, usize>>,
    ) -> Result<LossOutput<ConvNetParams>> {
        let (n, c, h, w) = x.dim();
        if (c, h, w) != self.input_dim {
            return Err(MlError::SizeMismatch {
                what: "input values per example",
                got: c * h * w,
                expected: self.input_dim.0 * self.input_dim.1 * self.input_dim.2,
            });
        }

        let ConvNetParams { w1, b1, w2, b2, w3, b3 } = &self.params;

        let (c1, conv_cache) = conv::forward(x, w1.view(), b1.view(), self.conv_param)?;
        let (r1, r1_cache) = relu::forward(c1.view());
        let (p1, pool_cache) = pool::forward(r1.view(), self.pool_param)?;

        let pooled_dim = p1.raw_dim();
        let flat = p1.into_shape_with_order((n, w2.nrows()))?;

        let (a2, a2_cache) = affine::forward(flat.view(), w2.view(), b2.view());
        let (r2, r2_cache) = relu::forward(a2.view());
        let (scores, a3_cache) = affine::forward(r2.view(), w3.view(), b3.view());

        let Some(y) = y else {
            return Ok(LossOutput::Scores(scores));
        };

        let (data_loss, dscores) = softmax_loss(scores.view(), y)?;
        let loss = data_loss + 0.5 * self.reg * self.params.weight_norm_sq();

        let (dr2, mut dw3, db3) = affine::backward(dscores.view(), a3_cache);
        let da2 = relu::backward(dr2.view(), r2_cache);
        let (dflat, mut dw2, db2) = affine::backward(da2.view(), a2_cache);

        let dp1 = dflat.into_shape_with_order(pooled_dim)?;
        let dr1 = pool::backward(dp1.view(), pool_cache);
        let dc1 = relu::backward(dr1.view(), r1_cache);
        let (_, mut dw1, db1) = conv::backward(dc1.view(), conv_cache)?;

        dw1.scaled_add(self.reg, w1);
        dw2.scaled_add(self.reg, w2);
        dw3.scaled_add(self.reg, w3);

        let grads = ConvNetParams {
            w1: dw1,
            b1: db1,
            w2: dw2,
            b2: db2,
            w3: dw3,
            b3: db3,
        };

        Ok(LossOutput::Loss { loss, grads })
    }
}

impl Trainable for ThreeLayerConvNet {
    type Params = ConvNetParams;

    fn params(&self) -> &ConvNetParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ConvNetParams {
        &mut self.params
    }
}
