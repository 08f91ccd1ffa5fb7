//! Serializable specifications for building classifiers and trainers.
//!
//! Every spec implements `Default` with the usual exercise hyper-parameters and
//! is `#[serde(default)]`, so a partial JSON document only needs to name the
//! fields it overrides.

use serde::{Deserialize, Serialize};

use crate::Float;

/// The specification for the normalization applied after each hidden affine layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationSpec {
    #[default]
    None,
    BatchNorm,
    LayerNorm,
}

/// The specification for the recurrent cell of a sequence model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellTypeSpec {
    #[default]
    Rnn,
    Lstm,
}

/// The specification for the direct-gradient two-layer network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoLayerSpec {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub std: Float,
    pub seed: Option<u64>,
}

impl Default for TwoLayerSpec {
    fn default() -> Self {
        Self {
            input_size: 3 * 32 * 32,
            hidden_size: 100,
            output_size: 10,
            std: 1e-4,
            seed: None,
        }
    }
}

/// The specification for the minibatch SGD loop of the direct-gradient network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSpec {
    pub learning_rate: Float,
    pub learning_rate_decay: Float,
    pub reg: Float,
    pub num_iters: usize,
    pub batch_size: usize,
    pub verbose: bool,
    pub seed: Option<u64>,
}

impl Default for TrainSpec {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            learning_rate_decay: 0.95,
            reg: 5e-6,
            num_iters: 100,
            batch_size: 200,
            verbose: false,
            seed: None,
        }
    }
}

/// The specification for the modular `affine - relu - affine` network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FcTwoLayerSpec {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub num_classes: usize,
    pub weight_scale: Float,
    pub reg: Float,
    pub seed: Option<u64>,
}

impl Default for FcTwoLayerSpec {
    fn default() -> Self {
        Self {
            input_dim: 3 * 32 * 32,
            hidden_dim: 100,
            num_classes: 10,
            weight_scale: 1e-3,
            reg: 0.0,
            seed: None,
        }
    }
}

/// The specification for the L-layer fully-connected network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FcNetSpec {
    pub hidden_dims: Vec<usize>,
    pub input_dim: usize,
    pub num_classes: usize,
    /// Probability of keeping a hidden unit; `1.0` disables dropout.
    pub dropout_keep_prob: Float,
    pub normalization: NormalizationSpec,
    pub reg: Float,
    pub weight_scale: Float,
    pub seed: Option<u64>,
}

impl Default for FcNetSpec {
    fn default() -> Self {
        Self {
            hidden_dims: vec![100],
            input_dim: 3 * 32 * 32,
            num_classes: 10,
            dropout_keep_prob: 1.0,
            normalization: NormalizationSpec::None,
            reg: 0.0,
            weight_scale: 1e-2,
            seed: None,
        }
    }
}

/// The specification for the three-layer convolutional network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvNetSpec {
    /// Input `(channels, height, width)`.
    pub input_dim: (usize, usize, usize),
    pub num_filters: usize,
    pub filter_size: usize,
    pub hidden_dim: usize,
    pub num_classes: usize,
    pub weight_scale: Float,
    pub reg: Float,
    pub seed: Option<u64>,
}

impl Default for ConvNetSpec {
    fn default() -> Self {
        Self {
            input_dim: (3, 32, 32),
            num_filters: 32,
            filter_size: 7,
            hidden_dim: 100,
            num_classes: 10,
            weight_scale: 1e-3,
            reg: 0.0,
            seed: None,
        }
    }
}

/// The specification for the feature-conditioned recurrent sequence model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptioningSpec {
    pub vocab_size: usize,
    pub null_idx: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub input_dim: usize,
    pub wordvec_dim: usize,
    pub hidden_dim: usize,
    pub cell_type: CellTypeSpec,
    pub seed: Option<u64>,
}

impl Default for CaptioningSpec {
    fn default() -> Self {
        Self {
            vocab_size: 1004,
            null_idx: 0,
            start_idx: 1,
            end_idx: 2,
            input_dim: 512,
            wordvec_dim: 128,
            hidden_dim: 128,
            cell_type: CellTypeSpec::Rnn,
            seed: None,
        }
    }
}
