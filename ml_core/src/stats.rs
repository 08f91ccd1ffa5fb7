use crate::Float;

/// Statistics recorded while training a classifier with minibatch SGD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainHistory {
    loss: Vec<Float>,
    train_acc: Vec<Float>,
    val_acc: Vec<Float>,
}

impl TrainHistory {
    /// Creates an empty `TrainHistory` able to hold `iters` losses without reallocating.
    pub fn with_capacity(iters: usize) -> Self {
        Self {
            loss: Vec::with_capacity(iters),
            ..Default::default()
        }
    }

    /// Records the minibatch loss of one iteration.
    pub fn push_loss(&mut self, loss: Float) {
        self.loss.push(loss);
    }

    /// Records the accuracies measured at the end of an epoch.
    pub fn push_accuracy(&mut self, train_acc: Float, val_acc: Float) {
        self.train_acc.push(train_acc);
        self.val_acc.push(val_acc);
    }

    /// Returns the loss of every iteration, in order.
    pub fn loss_history(&self) -> &[Float] {
        &self.loss
    }

    /// Returns the training accuracy measured once per epoch.
    ///
    /// Each value is measured on the minibatch of the iteration that closed
    /// the epoch, not on the full training set.
    pub fn train_acc_history(&self) -> &[Float] {
        &self.train_acc
    }

    /// Returns the validation accuracy measured once per epoch.
    pub fn val_acc_history(&self) -> &[Float] {
        &self.val_acc
    }
}
