use ml_core::Float;

/// Logistic sigmoid.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sigmoid;

impl Sigmoid {
    /// Evaluates the sigmoid without overflowing for large `|z|`: the
    /// exponential is only ever taken of a non-positive number.
    pub fn f(z: Float) -> Float {
        if z >= 0. {
            1. / (1. + (-z).exp())
        } else {
            let e = z.exp();
            e / (1. + e)
        }
    }
}
