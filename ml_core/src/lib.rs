mod error;
mod mode;
mod model;
mod rng;
pub mod specs;
mod stats;
mod tensors;

pub use error::{MlError, Result};
pub use mode::Mode;
pub use model::{argmax, Classifier, LossOutput, Trainable};
pub use rng::generate_rng;
pub use stats::TrainHistory;
pub use tensors::Tensors;

/// The element type every array in the workspace is made of.
#[cfg(not(feature = "f32"))]
pub type Float = f64;

/// The element type every array in the workspace is made of.
#[cfg(feature = "f32")]
pub type Float = f32;
