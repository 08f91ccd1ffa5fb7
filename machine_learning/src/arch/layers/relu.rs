use ml_core::Float;
use ndarray::{Array, ArrayView, Dimension, Ix2, Zip};

use crate::arch::activations::Relu;

#[derive(Debug, Clone)]
pub struct ReluCache<D: Dimension = Ix2> {
    x: Array<Float, D>,
}

/// Applies `max(0, x)` element-wise to an input of any shape.
pub fn forward<D: Dimension>(x: ArrayView<Float, D>) -> (Array<Float, D>, ReluCache<D>) {
    let out = x.mapv(Relu::f);
    (out, ReluCache { x: x.to_owned() })
}

/// Masks `dout` with the positions where the forward input was positive.
pub fn backward<D: Dimension>(dout: ArrayView<Float, D>, cache: ReluCache<D>) -> Array<Float, D> {
    let mut dx = cache.x;
    Zip::from(&mut dx)
        .and(&dout)
        .for_each(|x, &d| *x = d * Relu::df(*x));
    dx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient_check::{assert_gradients_close, eval_numerical_gradient_array};
    use ndarray::{array, Array3};

    #[test]
    fn forward_clamps_negatives() {
        let x = array![[-1., 0.5], [2., -0.1]];
        let (out, _) = forward(x.view());
        assert_eq!(out, array![[0., 0.5], [2., 0.]]);
    }

    #[test]
    fn backward_matches_numerical_gradient() {
        // Entries kept away from the kink at zero.
        let x = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| {
            let v = (i * 12 + j * 4 + k) as Float * 0.37 - 4.1;
            if v.abs() < 0.05 { v + 0.2 } else { v }
        });
        let dout = x.mapv(|v| (v * 1.3).sin());

        let dx_num = eval_numerical_gradient_array(|x| forward(x.view()).0, &x, &dout, 1e-5);
        let (_, cache) = forward(x.view());
        let dx = backward(dout.view(), cache);

        assert_gradients_close(dx.view(), dx_num.view(), 1e-8);
    }
}
