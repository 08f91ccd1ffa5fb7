use std::num::NonZeroUsize;

use log::{debug, info};
use ml_core::{specs::TrainSpec, Float, MlError, Result, Tensors, TrainHistory, Trainable};
use ndarray::prelude::*;
use rand::{rngs::StdRng, Rng};

use crate::optimization::{GradientDescent, Optimizer};

/// A minibatch stochastic gradient descent `Trainer`.
///
/// Every iteration samples a minibatch uniformly with replacement, evaluates
/// the model's loss on it and steps its parameters against the gradient.
/// Once per epoch it measures the accuracies and decays the learning rate.
pub struct SgdTrainer<R: Rng> {
    optimizer: GradientDescent,
    learning_rate_decay: Float,
    num_iters: usize,
    batch_size: NonZeroUsize,
    verbose: bool,
    rng: R,
}

impl SgdTrainer<StdRng> {
    /// Returns a new `SgdTrainer` configured by `spec`.
    ///
    /// # Errors
    /// Returns `MlError::InvalidInput` if the batch size is zero.
    pub fn from_spec(spec: &TrainSpec) -> Result<Self> {
        let batch_size = NonZeroUsize::new(spec.batch_size)
            .ok_or(MlError::InvalidInput("batch size must be positive"))?;

        Ok(Self::new(
            GradientDescent::new(spec.learning_rate),
            spec.learning_rate_decay,
            spec.num_iters,
            batch_size,
            spec.verbose,
            ml_core::generate_rng(spec.seed),
        ))
    }
}

impl<R: Rng> SgdTrainer<R> {
    /// Returns a new `SgdTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - The update rule, holding the initial learning rate.
    /// * `learning_rate_decay` - Factor applied to the learning rate after every epoch.
    /// * `num_iters` - The amount of minibatch steps to take.
    /// * `batch_size` - The amount of samples per minibatch.
    /// * `verbose` - Whether to log the loss every 100 iterations.
    /// * `rng` - A random number generator used to sample minibatches.
    pub fn new(
        optimizer: GradientDescent,
        learning_rate_decay: Float,
        num_iters: usize,
        batch_size: NonZeroUsize,
        verbose: bool,
        rng: R,
    ) -> Self {
        Self {
            optimizer,
            learning_rate_decay,
            num_iters,
            batch_size,
            verbose,
            rng,
        }
    }

    /// Trains `model` on `x`, `y`, validating on `x_val`, `y_val`.
    ///
    /// An epoch lasts `max(N / batch_size, 1)` iterations and the first
    /// accuracy check happens at iteration 0. The training accuracy is
    /// measured on the minibatch of the checking iteration only.
    ///
    /// # Returns
    /// The loss of every iteration and the accuracies of every epoch.
    ///
    /// # Errors
    /// Returns `MlError` if the training set is empty, the labels do not match
    /// the samples or the model fails to evaluate a batch.
    pub fn train<M>(
        &mut self,
        model: &mut M,
        x: ArrayView2<Float>,
        y: ArrayView1<usize>,
        x_val: ArrayView2<Float>,
        y_val: ArrayView1<usize>,
    ) -> Result<TrainHistory>
    where
        M: Trainable<Dim = Ix2>,
        M::Grads: Tensors,
    {
        let n = x.nrows();
        if n == 0 {
            return Err(MlError::InvalidInput("empty training set"));
        }
        if y.len() != n {
            return Err(MlError::SizeMismatch {
                what: "training labels",
                got: y.len(),
                expected: n,
            });
        }

        let batch_size = self.batch_size.get();
        let iterations_per_epoch = (n / batch_size).max(1);
        let mut history = TrainHistory::with_capacity(self.num_iters);

        for it in 0..self.num_iters {
            let idx: Vec<usize> = (0..batch_size)
                .map(|_| self.rng.random_range(0..n))
                .collect();
            let x_batch = x.select(Axis(0), &idx);
            let y_batch = y.select(Axis(0), &idx);

            let (loss, grads) = model
                .loss(x_batch.view(), Some(y_batch.view()))?
                .into_loss()?;
            history.push_loss(loss);

            self.optimizer.step(model.params_mut(), &grads);

            if self.verbose && it % 100 == 0 {
                info!(iteration = it, num_iters = self.num_iters, loss = loss; "sgd step");
            }

            if it % iterations_per_epoch == 0 {
                let train_acc = accuracy(model.predict(x_batch.view())?.view(), y_batch.view())?;
                let val_acc = accuracy(model.predict(x_val)?.view(), y_val)?;
                history.push_accuracy(train_acc, val_acc);

                debug!(
                    epoch = it / iterations_per_epoch,
                    train_acc = train_acc,
                    val_acc = val_acc,
                    learning_rate = self.optimizer.learning_rate();
                    "epoch finished"
                );

                self.optimizer.decay(self.learning_rate_decay);
            }
        }

        Ok(history)
    }
}

/// Fraction of `pred` equal to `y`, zero for empty inputs.
///
/// # Errors
/// Returns `MlError::SizeMismatch` if there is not one prediction per label.
pub fn accuracy(pred: ArrayView1<usize>, y: ArrayView1<usize>) -> Result<Float> {
    if pred.len() != y.len() {
        return Err(MlError::SizeMismatch {
            what: "predictions",
            got: pred.len(),
            expected: y.len(),
        });
    }
    if y.is_empty() {
        return Ok(0.);
    }

    let hits = pred.iter().zip(y).filter(|(p, t)| p == t).count();
    Ok(hits as Float / y.len() as Float)
}
