//! Fully-connected networks assembled from the layer primitives.

use log::debug;
use ml_core::{
    generate_rng,
    specs::{FcNetSpec, FcTwoLayerSpec, NormalizationSpec},
    Classifier, Float, LossOutput, MlError, Mode, Result, Tensors, Trainable,
};
use ndarray::prelude::*;
use rand::rngs::StdRng;

use super::two_layer::TwoLayerParams;
use crate::arch::{
    layers::{affine, batch_norm, dropout, layer_norm, relu, BatchNorm, Cache},
    loss::softmax_loss,
    scaled_normal,
};

/// An `affine - relu - affine - softmax` network.
///
/// The loss adds `0.5 · reg · Σ W²` over both weight matrices.
#[derive(Debug, Clone)]
pub struct TwoLayerFcNet {
    params: TwoLayerParams,
    reg: Float,
}

impl TwoLayerFcNet {
    pub fn new(spec: &FcTwoLayerSpec) -> Self {
        debug!(
            input_dim = spec.input_dim,
            hidden_dim = spec.hidden_dim,
            num_classes = spec.num_classes;
            "created two-layer fully-connected net"
        );

        Self {
            params: TwoLayerParams::new(
                spec.input_dim,
                spec.hidden_dim,
                spec.num_classes,
                spec.weight_scale,
                spec.seed,
            ),
            reg: spec.reg,
        }
    }
}

impl Classifier for TwoLayerFcNet {
    type Dim = Ix2;
    type Grads = TwoLayerParams;

    fn loss(
        &mut self,
        x: ArrayView2<'_, Float>,
        y: Option<ArrayView1<'_, usize>>,
    ) -> Result<LossOutput<TwoLayerParams>> {
        let TwoLayerParams { w1, b1, w2, b2 } = &self.params;
        check_features(x, w1.nrows())?;

        let (a1, a1_cache) = affine::forward(x, w1.view(), b1.view());
        let (r1, r1_cache) = relu::forward(a1.view());
        let (scores, a2_cache) = affine::forward(r1.view(), w2.view(), b2.view());

        let Some(y) = y else {
            return Ok(LossOutput::Scores(scores));
        };

        let (data_loss, dscores) = softmax_loss(scores.view(), y)?;
        let loss = data_loss + 0.5 * self.reg * self.params.weight_norm_sq();

        let (dr1, mut dw2, db2) = affine::backward(dscores.view(), a2_cache);
        let da1 = relu::backward(dr1.view(), r1_cache);
        let (_, mut dw1, db1) = affine::backward(da1.view(), a1_cache);

        dw1.scaled_add(self.reg, w1);
        dw2.scaled_add(self.reg, w2);

        let grads = TwoLayerParams {
            w1: dw1,
            b1: db1,
            w2: dw2,
            b2: db2,
        };

        Ok(LossOutput::Loss { loss, grads })
    }
}

impl Trainable for TwoLayerFcNet {
    type Params = TwoLayerParams;

    fn params(&self) -> &TwoLayerParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut TwoLayerParams {
        &mut self.params
    }
}

/// Gain and shift of a normalized layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormParams {
    pub gamma: Array1<Float>,
    pub beta: Array1<Float>,
}

/// The parameters, or gradients, of one affine layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FcLayerParams {
    pub w: Array2<Float>,
    pub b: Array1<Float>,
    /// Present on hidden layers of normalized networks only.
    pub norm: Option<NormParams>,
}

impl FcLayerParams {
    fn zeros_like(other: &Self) -> Self {
        Self {
            w: Array2::zeros(other.w.raw_dim()),
            b: Array1::zeros(other.b.raw_dim()),
            norm: other.norm.as_ref().map(|norm| NormParams {
                gamma: Array1::zeros(norm.gamma.raw_dim()),
                beta: Array1::zeros(norm.beta.raw_dim()),
            }),
        }
    }
}

/// The parameters, or gradients, of a `FullyConnectedNet`, first layer first.
#[derive(Debug, Clone, PartialEq)]
pub struct FcNetParams {
    pub layers: Vec<FcLayerParams>,
}

impl Tensors for FcNetParams {
    fn tensors(&self) -> Vec<ArrayViewD<'_, Float>> {
        let mut tensors = Vec::with_capacity(4 * self.layers.len());

        for layer in &self.layers {
            tensors.push(layer.w.view().into_dyn());
            tensors.push(layer.b.view().into_dyn());
            if let Some(norm) = &layer.norm {
                tensors.push(norm.gamma.view().into_dyn());
                tensors.push(norm.beta.view().into_dyn());
            }
        }

        tensors
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, Float>> {
        let mut tensors = Vec::with_capacity(4 * self.layers.len());

        for layer in &mut self.layers {
            tensors.push(layer.w.view_mut().into_dyn());
            tensors.push(layer.b.view_mut().into_dyn());
            if let Some(norm) = &mut layer.norm {
                tensors.push(norm.gamma.view_mut().into_dyn());
                tensors.push(norm.beta.view_mut().into_dyn());
            }
        }

        tensors
    }
}

/// The normalization of the hidden layers together with its runtime state.
#[derive(Debug, Clone)]
enum Normalizer {
    None,
    /// One set of running statistics per hidden layer.
    BatchNorm(Vec<BatchNorm>),
    LayerNorm,
}

/// An L-layer network
/// `{affine - [norm] - relu - [dropout]} x (L - 1) - affine - softmax`.
///
/// Whether a pass is a training or an inference pass is decided solely by the
/// presence of labels and handed to dropout and batch normalization.
#[derive(Debug, Clone)]
pub struct FullyConnectedNet {
    params: FcNetParams,
    normalizer: Normalizer,
    keep_prob: Float,
    reg: Float,
    seed: Option<u64>,
    rng: StdRng,
}

impl FullyConnectedNet {
    /// Returns a new `FullyConnectedNet` shaped by `spec`.
    ///
    /// # Errors
    /// Returns `MlError::InvalidInput` if the dropout keep probability is not in `(0, 1]`.
    pub fn new(spec: &FcNetSpec) -> Result<Self> {
        let keep_prob = spec.dropout_keep_prob;
        if !(keep_prob > 0. && keep_prob <= 1.) {
            return Err(MlError::InvalidInput("dropout keep probability must be in (0, 1]"));
        }

        let mut rng = generate_rng(spec.seed);

        let dims: Vec<usize> = std::iter::once(spec.input_dim)
            .chain(spec.hidden_dims.iter().copied())
            .chain(std::iter::once(spec.num_classes))
            .collect();
        let num_layers = dims.len() - 1;
        let normalized = spec.normalization != NormalizationSpec::None;

        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let (din, dout) = (pair[0], pair[1]);
                let norm = (normalized && i + 1 < num_layers).then(|| NormParams {
                    gamma: Array1::ones(dout),
                    beta: Array1::zeros(dout),
                });

                FcLayerParams {
                    w: scaled_normal((din, dout), spec.weight_scale, &mut rng),
                    b: Array1::zeros(dout),
                    norm,
                }
            })
            .collect();

        let normalizer = match spec.normalization {
            NormalizationSpec::None => Normalizer::None,
            NormalizationSpec::BatchNorm => {
                Normalizer::BatchNorm(spec.hidden_dims.iter().map(|&d| BatchNorm::new(d)).collect())
            }
            NormalizationSpec::LayerNorm => Normalizer::LayerNorm,
        };

        debug!(
            dims:? = dims,
            normalization:? = spec.normalization,
            keep_prob = keep_prob;
            "created fully-connected net"
        );

        Ok(Self {
            params: FcNetParams { layers },
            normalizer,
            keep_prob,
            reg: spec.reg,
            seed: spec.seed,
            rng,
        })
    }

    /// The amount of affine layers.
    pub fn num_layers(&self) -> usize {
        self.params.layers.len()
    }

    /// The running statistics of every hidden layer, empty unless the
    /// network uses batch normalization.
    pub fn batch_norms(&self) -> &[BatchNorm] {
        match &self.normalizer {
            Normalizer::BatchNorm(bns) => bns,
            _ => &[],
        }
    }
}

impl Classifier for FullyConnectedNet {
    type Dim = Ix2;
    type Grads = FcNetParams;

    fn loss(
        &mut self,
        x: ArrayView2<'_, Float>,
        y: Option<ArrayView1<'_, usize>>,
    ) -> Result<LossOutput<FcNetParams>> {
        let Self {
            params,
            normalizer,
            keep_prob,
            reg,
            seed,
            rng,
        } = self;
        let (keep_prob, reg) = (*keep_prob, *reg);

        let layers = &params.layers;
        check_features(x, layers[0].w.nrows())?;

        let mode = Mode::from_labels(y);

        // A seeded network draws the same dropout masks on every call.
        let mut seeded;
        let rng = match seed {
            Some(seed) => {
                seeded = generate_rng(Some(*seed));
                &mut seeded
            }
            None => rng,
        };

        let mut caches: Vec<Cache> = Vec::with_capacity(4 * layers.len());
        let mut out = x.to_owned();

        for (i, layer) in layers.iter().enumerate() {
            let (a, cache) = affine::forward(out.view(), layer.w.view(), layer.b.view());
            caches.push(cache.into());
            out = a;

            if i + 1 == layers.len() {
                break;
            }

            if let Some(norm) = &layer.norm {
                let (gamma, beta) = (norm.gamma.view(), norm.beta.view());
                match &mut *normalizer {
                    Normalizer::BatchNorm(bns) => {
                        let (n, cache) = bns[i].forward(out.view(), gamma, beta, mode)?;
                        caches.push(cache.into());
                        out = n;
                    }
                    Normalizer::LayerNorm => {
                        let (n, cache) =
                            layer_norm::forward(out.view(), gamma, beta, layer_norm::EPS)?;
                        caches.push(cache.into());
                        out = n;
                    }
                    Normalizer::None => {}
                }
            }

            let (r, cache) = relu::forward(out.view());
            caches.push(cache.into());
            out = r;

            if keep_prob < 1. {
                let (d, cache) = dropout::forward(out.view(), keep_prob, mode, rng)?;
                caches.push(cache.into());
                out = d;
            }
        }

        let Some(y) = y else {
            return Ok(LossOutput::Scores(out));
        };

        let (mut loss, mut dout) = softmax_loss(out.view(), y)?;
        let mut grads: Vec<FcLayerParams> = layers.iter().map(FcLayerParams::zeros_like).collect();
        let mut layer = layers.len();

        while let Some(cache) = caches.pop() {
            dout = match cache {
                Cache::Dropout(cache) => dropout::backward(dout.view(), cache),
                Cache::Relu(cache) => relu::backward(dout.view(), cache),
                Cache::BatchNorm(cache) => {
                    let (dx, dgamma, dbeta) = batch_norm::backward(dout.view(), cache);
                    set_norm_grads(&mut grads[layer - 1], dgamma, dbeta);
                    dx
                }
                Cache::LayerNorm(cache) => {
                    let (dx, dgamma, dbeta) = layer_norm::backward(dout.view(), cache);
                    set_norm_grads(&mut grads[layer - 1], dgamma, dbeta);
                    dx
                }
                Cache::Affine(cache) => {
                    layer -= 1;
                    let w = &layers[layer].w;
                    let (dx, mut dw, db) = affine::backward(dout.view(), cache);

                    dw.scaled_add(reg, w);
                    loss += 0.5 * reg * w.mapv(|v| v * v).sum();

                    grads[layer].w = dw;
                    grads[layer].b = db;
                    dx
                }
            };
        }

        let grads = FcNetParams { layers: grads };
        Ok(LossOutput::Loss { loss, grads })
    }
}

impl Trainable for FullyConnectedNet {
    type Params = FcNetParams;

    fn params(&self) -> &FcNetParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut FcNetParams {
        &mut self.params
    }
}

fn set_norm_grads(grads: &mut FcLayerParams, dgamma: Array1<Float>, dbeta: Array1<Float>) {
    if let Some(norm) = &mut grads.norm {
        norm.gamma = dgamma;
        norm.beta = dbeta;
    }
}

pub(super) fn check_features(x: ArrayView2<Float>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(MlError::SizeMismatch {
            what: "input features",
            got: x.ncols(),
            expected,
        });
    }

    Ok(())
}
