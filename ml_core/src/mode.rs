use serde::{Deserialize, Serialize};

/// Whether a forward pass is part of a training step or an inference call.
///
/// Stochastic and stateful primitives (dropout, batch normalization) receive
/// it explicitly on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Train,
    Test,
}

impl Mode {
    /// The mode implied by the presence of labels: training when labels were
    /// supplied, inference otherwise.
    pub fn from_labels<T>(labels: Option<T>) -> Self {
        match labels {
            Some(_) => Mode::Train,
            None => Mode::Test,
        }
    }
}
