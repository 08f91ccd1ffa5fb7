//! Image classifiers and a caption generator built from hand-derived
//! forward/backward primitives over `ndarray`.

pub mod arch;
pub mod classifiers;
pub mod gradient_check;
pub mod optimization;
pub mod training;

pub use ml_core::{specs, Classifier, Float, LossOutput, MlError, Mode, Result, Tensors, Trainable};
