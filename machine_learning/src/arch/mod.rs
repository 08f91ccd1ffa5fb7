pub mod activations;
mod init;
pub mod layers;
pub mod loss;

pub use init::scaled_normal;
