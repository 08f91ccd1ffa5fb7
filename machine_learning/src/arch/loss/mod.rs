mod softmax;
mod temporal_softmax;

pub use softmax::softmax_loss;
pub use temporal_softmax::temporal_softmax_loss;
