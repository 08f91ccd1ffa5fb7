use ml_core::Float;

/// Rectified linear unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn f(z: Float) -> Float {
        z.max(0.)
    }

    /// Derivative at `z`, taking the subgradient at zero to be zero.
    pub fn df(z: Float) -> Float {
        if z > 0. { 1. } else { 0. }
    }
}
