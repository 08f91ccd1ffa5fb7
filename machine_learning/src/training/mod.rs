mod sgd_trainer;

pub use sgd_trainer::{accuracy, SgdTrainer};
