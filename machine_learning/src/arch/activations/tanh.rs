use ml_core::Float;

/// Hyperbolic tangent.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tanh;

impl Tanh {
    pub fn f(z: Float) -> Float {
        z.tanh()
    }

    /// Derivative at `z`.
    pub fn df(z: Float) -> Float {
        let t = z.tanh();
        1. - t * t
    }
}
