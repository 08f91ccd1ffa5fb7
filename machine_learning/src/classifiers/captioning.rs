//! A recurrent sequence model conditioned on a feature vector per example.

use log::debug;
use ml_core::{
    argmax, generate_rng,
    specs::{CaptioningSpec, CellTypeSpec},
    Float, MlError, Result, Tensors,
};
use ndarray::prelude::*;

use crate::arch::{
    layers::{
        affine, embedding, lstm,
        lstm::LstmCache,
        rnn::{self, RnnCache, SequenceGrads},
        temporal_affine,
    },
    loss::temporal_softmax_loss,
    scaled_normal,
};

/// The recurrent cell unrolled over the caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Rnn,
    Lstm,
}

impl CellType {
    /// Amount of `H`-wide blocks in the recurrent weight matrices.
    fn blocks(self) -> usize {
        match self {
            CellType::Rnn => 1,
            CellType::Lstm => 4,
        }
    }
}

impl From<CellTypeSpec> for CellType {
    fn from(spec: CellTypeSpec) -> Self {
        match spec {
            CellTypeSpec::Rnn => CellType::Rnn,
            CellTypeSpec::Lstm => CellType::Lstm,
        }
    }
}

/// The parameters, or gradients, of a `CaptioningRnn`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptioningParams {
    /// Feature to initial hidden state projection, `(D, H)`.
    pub w_proj: Array2<Float>,
    pub b_proj: Array1<Float>,
    /// Word vectors, `(V, W)`.
    pub w_embed: Array2<Float>,
    /// Input-to-hidden weights, `(W, H)` or `(W, 4H)`.
    pub wx: Array2<Float>,
    /// Hidden-to-hidden weights, `(H, H)` or `(H, 4H)`.
    pub wh: Array2<Float>,
    pub b: Array1<Float>,
    /// Hidden state to vocabulary scores, `(H, V)`.
    pub w_vocab: Array2<Float>,
    pub b_vocab: Array1<Float>,
}

impl Tensors for CaptioningParams {
    fn tensors(&self) -> Vec<ArrayViewD<'_, Float>> {
        vec![
            self.w_proj.view().into_dyn(),
            self.b_proj.view().into_dyn(),
            self.w_embed.view().into_dyn(),
            self.wx.view().into_dyn(),
            self.wh.view().into_dyn(),
            self.b.view().into_dyn(),
            self.w_vocab.view().into_dyn(),
            self.b_vocab.view().into_dyn(),
        ]
    }

    fn tensors_mut(&mut self) -> Vec<ArrayViewMutD<'_, Float>> {
        vec![
            self.w_proj.view_mut().into_dyn(),
            self.b_proj.view_mut().into_dyn(),
            self.w_embed.view_mut().into_dyn(),
            self.wx.view_mut().into_dyn(),
            self.wh.view_mut().into_dyn(),
            self.b.view_mut().into_dyn(),
            self.w_vocab.view_mut().into_dyn(),
            self.b_vocab.view_mut().into_dyn(),
        ]
    }
}

enum SequenceCache {
    Rnn(RnnCache),
    Lstm(LstmCache),
}

/// Generates a word sequence from a feature vector.
///
/// The projected features are the initial hidden state; every timestep reads
/// the embedding of the previous word and scores the next one over the whole
/// vocabulary.
#[derive(Debug, Clone)]
pub struct CaptioningRnn {
    params: CaptioningParams,
    cell_type: CellType,
    null_idx: usize,
    start_idx: usize,
}

impl CaptioningRnn {
    /// Returns a new `CaptioningRnn` shaped by `spec`.
    ///
    /// # Errors
    /// Returns `MlError::IndexOutOfRange` if a special token is not in the vocabulary.
    pub fn new(spec: &CaptioningSpec) -> Result<Self> {
        let v = spec.vocab_size;
        for index in [spec.null_idx, spec.start_idx, spec.end_idx] {
            if index >= v {
                return Err(MlError::IndexOutOfRange {
                    what: "special token",
                    index,
                    len: v,
                });
            }
        }

        let cell_type = CellType::from(spec.cell_type);
        let (d, w, h) = (spec.input_dim, spec.wordvec_dim, spec.hidden_dim);
        let gates = cell_type.blocks() * h;
        let fan_in = |n: usize| 1. / (n.max(1) as Float).sqrt();

        let mut rng = generate_rng(spec.seed);
        let params = CaptioningParams {
            w_proj: scaled_normal((d, h), fan_in(d), &mut rng),
            b_proj: Array1::zeros(h),
            w_embed: scaled_normal((v, w), 1e-2, &mut rng),
            wx: scaled_normal((w, gates), fan_in(w), &mut rng),
            wh: scaled_normal((h, gates), fan_in(h), &mut rng),
            b: Array1::zeros(gates),
            w_vocab: scaled_normal((h, v), fan_in(h), &mut rng),
            b_vocab: Array1::zeros(v),
        };

        debug!(
            vocab_size = v,
            hidden_dim = h,
            cell_type:? = cell_type;
            "created captioning rnn"
        );

        Ok(Self {
            params,
            cell_type,
            null_idx: spec.null_idx,
            start_idx: spec.start_idx,
        })
    }

    pub fn params(&self) -> &CaptioningParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut CaptioningParams {
        &mut self.params
    }

    /// Computes the training loss and gradients.
    ///
    /// The model reads `captions[:, :-1]` and is scored against
    /// `captions[:, 1:]`; targets equal to the null token are masked out.
    ///
    /// # Arguments
    /// * `features` - Input features of shape `(N, D)`.
    /// * `captions` - Ground-truth word indices of shape `(N, T)`, `T >= 2`.
    ///
    /// # Errors
    /// Returns `MlError` if the shapes disagree with the model or a word is
    /// not in the vocabulary.
    pub fn loss(
        &self,
        features: ArrayView2<'_, Float>,
        captions: ArrayView2<'_, usize>,
    ) -> Result<(Float, CaptioningParams)> {
        self.check_features(features)?;
        if captions.ncols() < 2 {
            return Err(MlError::InvalidInput("captions need at least two words"));
        }
        if captions.nrows() != features.nrows() {
            return Err(MlError::SizeMismatch {
                what: "captions",
                got: captions.nrows(),
                expected: features.nrows(),
            });
        }

        let p = &self.params;
        let captions_in = captions.slice(s![.., ..-1]);
        let captions_out = captions.slice(s![.., 1..]);
        let mask = captions_out.mapv(|word| word != self.null_idx);

        let (h0, proj_cache) = affine::forward(features, p.w_proj.view(), p.b_proj.view());
        let (words, embed_cache) = embedding::forward(captions_in, p.w_embed.view())?;

        let (wx, wh, b) = (p.wx.view(), p.wh.view(), p.b.view());
        let (h, seq_cache) = match self.cell_type {
            CellType::Rnn => {
                let (h, cache) = rnn::forward(words.view(), h0.view(), wx, wh, b);
                (h, SequenceCache::Rnn(cache))
            }
            CellType::Lstm => {
                let (h, cache) = lstm::forward(words.view(), h0.view(), wx, wh, b);
                (h, SequenceCache::Lstm(cache))
            }
        };

        let (scores, vocab_cache) =
            temporal_affine::forward(h.view(), p.w_vocab.view(), p.b_vocab.view())?;
        let (loss, dscores) = temporal_softmax_loss(scores.view(), captions_out, mask.view())?;

        let (dh, w_vocab, b_vocab) = temporal_affine::backward(dscores.view(), vocab_cache)?;
        let SequenceGrads {
            dx: dwords,
            dh0,
            dwx,
            dwh,
            db,
        } = match seq_cache {
            SequenceCache::Rnn(cache) => rnn::backward(dh.view(), cache),
            SequenceCache::Lstm(cache) => lstm::backward(dh.view(), cache),
        };
        let w_embed = embedding::backward(dwords.view(), embed_cache);
        let (_, w_proj, b_proj) = affine::backward(dh0.view(), proj_cache);

        let grads = CaptioningParams {
            w_proj,
            b_proj,
            w_embed,
            wx: dwx,
            wh: dwh,
            b: db,
            w_vocab,
            b_vocab,
        };

        Ok((loss, grads))
    }

    /// Greedily decodes `max_length` words for every feature vector.
    ///
    /// Decoding starts from the start token and feeds the arg-max word of each
    /// timestep into the next. The first column holds the first generated
    /// word; the start token is not part of the output.
    ///
    /// # Errors
    /// Returns `MlError::SizeMismatch` if `features` is not `(N, D)`.
    pub fn sample(
        &self,
        features: ArrayView2<'_, Float>,
        max_length: usize,
    ) -> Result<Array2<usize>> {
        self.check_features(features)?;

        let p = &self.params;
        let n = features.nrows();
        let mut captions = Array2::from_elem((n, max_length), self.null_idx);

        let (mut prev_h, _) = affine::forward(features, p.w_proj.view(), p.b_proj.view());
        let mut prev_c = Array2::<Float>::zeros(prev_h.raw_dim());
        let mut words = vec![self.start_idx; n];

        for mut column in captions.columns_mut() {
            let x = p.w_embed.select(Axis(0), &words);
            let (wx, wh, b) = (p.wx.view(), p.wh.view(), p.b.view());

            prev_h = match self.cell_type {
                CellType::Rnn => rnn::step_forward(x.view(), prev_h.view(), wx, wh, b).0,
                CellType::Lstm => {
                    let (next_h, next_c, _) =
                        lstm::step_forward(x.view(), prev_h.view(), prev_c.view(), wx, wh, b);
                    prev_c = next_c;
                    next_h
                }
            };

            let scores = prev_h.dot(&p.w_vocab) + &p.b_vocab;
            let next = scores.map_axis(Axis(1), argmax);
            column.assign(&next);
            words = next.to_vec();
        }

        Ok(captions)
    }

    fn check_features(&self, features: ArrayView2<Float>) -> Result<()> {
        let expected = self.params.w_proj.nrows();
        if features.ncols() != expected {
            return Err(MlError::SizeMismatch {
                what: "input features",
                got: features.ncols(),
                expected,
            });
        }

        Ok(())
    }
}
