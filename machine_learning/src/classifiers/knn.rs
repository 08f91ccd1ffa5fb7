use std::{collections::BTreeMap, num::NonZeroUsize};

use log::{debug, warn};
use ml_core::{Float, MlError, Result};
use ndarray::prelude::*;

/// How `KNearestNeighbor` computes its distance matrix.
///
/// All three are exact and agree up to floating-point rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceAlgorithm {
    /// Every pair separately.
    TwoLoops,
    /// One query against all references at a time.
    OneLoop,
    /// `‖x−y‖² = ‖x‖² + ‖y‖² − 2x·y` as a single matrix product.
    #[default]
    NoLoops,
}

impl TryFrom<usize> for DistanceAlgorithm {
    type Error = MlError;

    /// Selects an algorithm by its number of explicit loops.
    fn try_from(num_loops: usize) -> Result<Self> {
        match num_loops {
            0 => Ok(DistanceAlgorithm::NoLoops),
            1 => Ok(DistanceAlgorithm::OneLoop),
            2 => Ok(DistanceAlgorithm::TwoLoops),
            value => Err(MlError::InvalidAlgorithm { value }),
        }
    }
}

/// A k-nearest-neighbor classifier under squared Euclidean distance.
#[derive(Debug, Clone)]
pub struct KNearestNeighbor {
    x_train: Array2<Float>,
    y_train: Array1<usize>,
}

impl Default for KNearestNeighbor {
    fn default() -> Self {
        Self::new()
    }
}

impl KNearestNeighbor {
    /// Returns a new `KNearestNeighbor` with no stored references.
    pub fn new() -> Self {
        Self {
            x_train: Array2::zeros((0, 0)),
            y_train: Array1::zeros(0),
        }
    }

    /// Memorizes the reference vectors `x` of shape `(M, D)` and their labels.
    ///
    /// # Errors
    /// Returns `MlError::SizeMismatch` if there is not one label per vector.
    pub fn train(&mut self, x: ArrayView2<Float>, y: ArrayView1<usize>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(MlError::SizeMismatch {
                what: "training labels",
                got: y.len(),
                expected: x.nrows(),
            });
        }

        debug!(references = x.nrows(), features = x.ncols(); "stored knn references");

        self.x_train = x.to_owned();
        self.y_train = y.to_owned();
        Ok(())
    }

    /// Predicts the label of every query of `x` of shape `(N, D)` by majority
    /// vote among its `k` nearest references.
    ///
    /// # Errors
    /// Returns `MlError` if nothing was stored or the feature sizes differ.
    pub fn predict(
        &self,
        x: ArrayView2<Float>,
        k: NonZeroUsize,
        algorithm: DistanceAlgorithm,
    ) -> Result<Array1<usize>> {
        let dists = self.compute_distances(x, algorithm)?;
        self.predict_labels(dists.view(), k)
    }

    /// Computes the `(N, M)` matrix of squared distances between every query
    /// and every reference.
    ///
    /// # Errors
    /// Returns `MlError` if nothing was stored or the feature sizes differ.
    pub fn compute_distances(
        &self,
        x: ArrayView2<Float>,
        algorithm: DistanceAlgorithm,
    ) -> Result<Array2<Float>> {
        if self.y_train.is_empty() {
            return Err(MlError::InvalidInput("no references were stored"));
        }
        if x.ncols() != self.x_train.ncols() {
            return Err(MlError::SizeMismatch {
                what: "query features",
                got: x.ncols(),
                expected: self.x_train.ncols(),
            });
        }

        let dists = match algorithm {
            DistanceAlgorithm::TwoLoops => self.compute_distances_two_loops(x),
            DistanceAlgorithm::OneLoop => self.compute_distances_one_loop(x),
            DistanceAlgorithm::NoLoops => self.compute_distances_no_loops(x),
        };

        Ok(dists)
    }

    pub fn compute_distances_two_loops(&self, x: ArrayView2<Float>) -> Array2<Float> {
        let mut dists = Array2::zeros((x.nrows(), self.x_train.nrows()));

        for (i, query) in x.rows().into_iter().enumerate() {
            for (j, reference) in self.x_train.rows().into_iter().enumerate() {
                dists[[i, j]] = query
                    .iter()
                    .zip(&reference)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
            }
        }

        dists
    }

    pub fn compute_distances_one_loop(&self, x: ArrayView2<Float>) -> Array2<Float> {
        let mut dists = Array2::zeros((x.nrows(), self.x_train.nrows()));

        for (query, mut row) in x.rows().into_iter().zip(dists.rows_mut()) {
            let diff = &self.x_train - &query;
            row.assign(&diff.mapv(|v| v * v).sum_axis(Axis(1)));
        }

        dists
    }

    pub fn compute_distances_no_loops(&self, x: ArrayView2<Float>) -> Array2<Float> {
        let x_sq = x.mapv(|v| v * v).sum_axis(Axis(1)).insert_axis(Axis(1));
        let train_sq = self.x_train.mapv(|v| v * v).sum_axis(Axis(1));

        let mut dists = x.dot(&self.x_train.t()) * -2.;
        dists += &x_sq;
        dists += &train_sq;
        // Rounding may push the distance of identical vectors below zero.
        dists.mapv_inplace(|v| v.max(0.));
        dists
    }

    /// Votes among the `k` smallest entries of every row of `dists`.
    ///
    /// Ties in vote count go to the smallest label. If `k` exceeds the number
    /// of references, every reference votes.
    ///
    /// # Errors
    /// Returns `MlError::SizeMismatch` if `dists` does not have one column per reference.
    pub fn predict_labels(
        &self,
        dists: ArrayView2<Float>,
        k: NonZeroUsize,
    ) -> Result<Array1<usize>> {
        let num_train = self.y_train.len();
        if dists.ncols() != num_train {
            return Err(MlError::SizeMismatch {
                what: "distance columns",
                got: dists.ncols(),
                expected: num_train,
            });
        }

        let k = k.get();
        if k > num_train {
            warn!(k = k, references = num_train; "k exceeds the number of stored references");
        }

        let labels = dists
            .rows()
            .into_iter()
            .map(|row| {
                let mut order: Vec<usize> = (0..num_train).collect();
                order.sort_by(|&a, &b| row[a].total_cmp(&row[b]));

                let mut votes = BTreeMap::new();
                for &j in order.iter().take(k) {
                    *votes.entry(self.y_train[j]).or_insert(0usize) += 1;
                }

                votes
                    .into_iter()
                    .fold((0, 0), |(best, max), (label, count)| {
                        if count > max { (label, count) } else { (best, max) }
                    })
                    .0
            })
            .collect();

        Ok(labels)
    }
}
