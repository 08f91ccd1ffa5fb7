mod captioning;
mod cnn;
mod fc_net;
mod knn;
mod two_layer;

pub use captioning::{CaptioningParams, CaptioningRnn, CellType};
pub use cnn::{ConvNetParams, ThreeLayerConvNet};
pub use fc_net::{FcLayerParams, FcNetParams, FullyConnectedNet, NormParams, TwoLayerFcNet};
pub use knn::{DistanceAlgorithm, KNearestNeighbor};
pub use two_layer::{TwoLayerNet, TwoLayerParams};
