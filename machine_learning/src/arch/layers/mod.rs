//! Forward/backward primitive pairs.
//!
//! Every `forward` returns its output together with an owned cache holding
//! exactly what the paired `backward` needs; `backward` consumes the cache.

pub mod affine;
pub mod batch_norm;
mod cache;
pub mod conv;
pub mod dropout;
pub mod embedding;
pub mod layer_norm;
pub mod lstm;
pub mod pool;
pub mod relu;
pub mod rnn;
pub mod temporal_affine;

pub use batch_norm::BatchNorm;
pub use cache::Cache;
pub use conv::ConvParam;
pub use pool::PoolParam;
