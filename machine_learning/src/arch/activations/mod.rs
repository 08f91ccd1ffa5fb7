mod relu;
mod sigmoid;
mod tanh;

pub use relu::Relu;
pub use sigmoid::Sigmoid;
pub use tanh::Tanh;
