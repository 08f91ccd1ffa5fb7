use ml_core::{Float, MlError, Result};
use ndarray::{linalg, prelude::*};

/// Geometry of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvParam {
    pub stride: usize,
    /// Amount of zeros added on each side of both spatial axes.
    pub pad: usize,
}

impl ConvParam {
    /// Output spatial size along an axis of `input` entries for a filter of `filter` entries.
    fn out_size(&self, input: usize, filter: usize) -> Result<usize> {
        let padded = input + 2 * self.pad;
        if self.stride == 0 || filter > padded || (padded - filter) % self.stride != 0 {
            return Err(MlError::InvalidInput(
                "convolution filter does not tile the padded input",
            ));
        }

        Ok(1 + (padded - filter) / self.stride)
    }
}

#[derive(Debug, Clone)]
pub struct ConvCache {
    x_dim: (usize, usize, usize, usize),
    /// One `(C·HH·WW, H'·W')` patch matrix per example.
    cols: Vec<Array2<Float>>,
    w: Array4<Float>,
    param: ConvParam,
}

/// Naive convolution of `x` of shape `(N, C, H, W)` with filters `w` of shape
/// `(F, C, HH, WW)` and biases `b` of shape `(F,)`.
///
/// # Returns
/// The output of shape `(N, F, H', W')` with
/// `H' = 1 + (H + 2·pad - HH) / stride`, and the cache for the backward pass.
///
/// # Errors
/// Returns `MlError::SizeMismatch` if the channel counts of `x` and `w` differ
/// and `MlError::InvalidInput` if the filters do not tile the padded input.
pub fn forward(
    x: ArrayView4<Float>,
    w: ArrayView4<Float>,
    b: ArrayView1<Float>,
    param: ConvParam,
) -> Result<(Array4<Float>, ConvCache)> {
    let (n, c, h, wd) = x.dim();
    let (f, wc, hh, ww) = w.dim();

    if c != wc {
        return Err(MlError::SizeMismatch {
            what: "filter channels",
            got: wc,
            expected: c,
        });
    }

    let h_out = param.out_size(h, hh)?;
    let w_out = param.out_size(wd, ww)?;

    let w_mat = w.to_shape((f, c * hh * ww))?;
    let b_col = b.insert_axis(Axis(1));

    let mut out = Array4::zeros((n, f, h_out, w_out));
    let mut cols = Vec::with_capacity(n);

    for (x_n, mut out_n) in x.outer_iter().zip(out.outer_iter_mut()) {
        let x_padded = pad(x_n, param.pad);
        let col = im2col(x_padded.view(), (hh, ww), (h_out, w_out), param.stride);

        let y = w_mat.dot(&col) + &b_col;
        out_n.assign(&y.into_shape_with_order((f, h_out, w_out))?);

        cols.push(col);
    }

    let cache = ConvCache {
        x_dim: (n, c, h, wd),
        cols,
        w: w.to_owned(),
        param,
    };

    Ok((out, cache))
}

/// Backpropagates through the convolution.
///
/// # Returns
/// The gradients `(dx, dw, db)` with the shapes of `x`, `w` and `b`.
///
/// # Errors
/// Returns `MlError::Shape` if `dout` does not have the forward output's shape.
pub fn backward(
    dout: ArrayView4<Float>,
    cache: ConvCache,
) -> Result<(Array4<Float>, Array4<Float>, Array1<Float>)> {
    let ConvCache {
        x_dim: (n, c, h, wd),
        cols,
        w,
        param,
    } = cache;
    let (f, _, hh, ww) = w.dim();
    let (_, _, h_out, w_out) = dout.dim();
    let pad = param.pad;

    let w_mat = w.to_shape((f, c * hh * ww))?;
    let mut dw_mat = Array2::zeros((f, c * hh * ww));
    let mut dx = Array4::zeros((n, c, h, wd));

    for ((dout_n, col), mut dx_n) in dout.outer_iter().zip(&cols).zip(dx.outer_iter_mut()) {
        let dout_n = dout_n.to_shape((f, h_out * w_out))?;

        linalg::general_mat_mul(1.0, &dout_n, &col.t(), 1.0, &mut dw_mat);

        let dcol = w_mat.t().dot(&dout_n);
        let dx_padded = col2im(
            dcol.view(),
            (c, h + 2 * pad, wd + 2 * pad),
            (hh, ww),
            (h_out, w_out),
            param.stride,
        );
        dx_n.assign(&dx_padded.slice(s![.., pad..pad + h, pad..pad + wd]));
    }

    let dw = dw_mat.into_shape_with_order((f, c, hh, ww))?;
    let db = dout
        .sum_axis(Axis(3))
        .sum_axis(Axis(2))
        .sum_axis(Axis(0));

    Ok((dx, dw, db))
}

fn pad(x: ArrayView3<Float>, pad: usize) -> Array3<Float> {
    let (c, h, w) = x.dim();
    let mut padded = Array3::zeros((c, h + 2 * pad, w + 2 * pad));
    padded
        .slice_mut(s![.., pad..pad + h, pad..pad + w])
        .assign(&x);
    padded
}

/// Lays every receptive field of `x` out as a column.
fn im2col(
    x: ArrayView3<Float>,
    (hh, ww): (usize, usize),
    (h_out, w_out): (usize, usize),
    stride: usize,
) -> Array2<Float> {
    let c = x.dim().0;
    let mut col = Array2::zeros((c * hh * ww, h_out * w_out));

    for i in 0..h_out {
        for j in 0..w_out {
            let (hs, ws) = (i * stride, j * stride);
            let patch = x.slice(s![.., hs..hs + hh, ws..ws + ww]);

            for (dst, &src) in col.column_mut(i * w_out + j).iter_mut().zip(patch.iter()) {
                *dst = src;
            }
        }
    }

    col
}

/// Scatter-adds every column of `col` back onto its receptive field.
fn col2im(
    col: ArrayView2<Float>,
    dim: (usize, usize, usize),
    (hh, ww): (usize, usize),
    (h_out, w_out): (usize, usize),
    stride: usize,
) -> Array3<Float> {
    let mut x = Array3::zeros(dim);

    for i in 0..h_out {
        for j in 0..w_out {
            let (hs, ws) = (i * stride, j * stride);
            let mut patch = x.slice_mut(s![.., hs..hs + hh, ws..ws + ww]);

            for (dst, &src) in patch.iter_mut().zip(col.column(i * w_out + j)) {
                *dst += src;
            }
        }
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::scaled_normal,
        gradient_check::{assert_gradients_close, eval_numerical_gradient_array},
    };
    use ml_core::generate_rng;

    #[test]
    fn forward_matches_direct_sum() {
        let mut rng = generate_rng(Some(231));
        let x: Array4<Float> = scaled_normal((2, 3, 5, 5), 1., &mut rng);
        let w: Array4<Float> = scaled_normal((4, 3, 3, 3), 1., &mut rng);
        let b: Array1<Float> = scaled_normal(4, 1., &mut rng);
        let param = ConvParam { stride: 2, pad: 1 };

        let (out, _) = forward(x.view(), w.view(), b.view(), param).unwrap();
        assert_eq!(out.dim(), (2, 4, 3, 3));

        let padded = pad(x.index_axis(Axis(0), 1), 1);
        let patch = padded.slice(s![.., 2..5, 4..7]);
        let expected = (&patch * &w.index_axis(Axis(0), 3)).sum() + b[3];
        assert!((out[[1, 3, 1, 2]] - expected).abs() < 1e-12);
    }

    #[test]
    fn forward_rejects_untiled_input() {
        let x = Array4::zeros((1, 1, 4, 4));
        let w = Array4::zeros((1, 1, 3, 3));
        let b = Array1::zeros(1);
        let param = ConvParam { stride: 2, pad: 0 };
        assert!(forward(x.view(), w.view(), b.view(), param).is_err());
    }

    #[test]
    fn forward_rejects_channel_mismatch() {
        let x = Array4::zeros((1, 2, 4, 4));
        let w = Array4::zeros((1, 3, 3, 3));
        let b = Array1::zeros(1);
        let param = ConvParam { stride: 1, pad: 1 };
        assert!(matches!(
            forward(x.view(), w.view(), b.view(), param),
            Err(MlError::SizeMismatch { got: 3, expected: 2, .. })
        ));
    }

    #[test]
    fn backward_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(231));
        let x: Array4<Float> = scaled_normal((4, 3, 5, 5), 1., &mut rng);
        let w: Array4<Float> = scaled_normal((2, 3, 3, 3), 1., &mut rng);
        let b: Array1<Float> = scaled_normal(2, 1., &mut rng);
        let dout: Array4<Float> = scaled_normal((4, 2, 5, 5), 1., &mut rng);
        let param = ConvParam { stride: 1, pad: 1 };

        let fwd = |x: &Array4<Float>, w: &Array4<Float>, b: &Array1<Float>| {
            forward(x.view(), w.view(), b.view(), param).unwrap().0
        };

        let dx_num = eval_numerical_gradient_array(|x| fwd(x, &w, &b), &x, &dout, 1e-6);
        let dw_num = eval_numerical_gradient_array(|w| fwd(&x, w, &b), &w, &dout, 1e-6);
        let db_num = eval_numerical_gradient_array(|b| fwd(&x, &w, b), &b, &dout, 1e-6);

        let (_, cache) = forward(x.view(), w.view(), b.view(), param).unwrap();
        let (dx, dw, db) = backward(dout.view(), cache).unwrap();

        assert_gradients_close(dx.view(), dx_num.view(), 1e-7);
        assert_gradients_close(dw.view(), dw_num.view(), 1e-7);
        assert_gradients_close(db.view(), db_num.view(), 1e-7);
    }

    #[test]
    fn strided_backward_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(17));
        let x: Array4<Float> = scaled_normal((2, 2, 7, 7), 1., &mut rng);
        let w: Array4<Float> = scaled_normal((3, 2, 3, 3), 1., &mut rng);
        let b: Array1<Float> = scaled_normal(3, 1., &mut rng);
        let param = ConvParam { stride: 2, pad: 0 };
        let dout: Array4<Float> = scaled_normal((2, 3, 3, 3), 1., &mut rng);

        let dx_num = eval_numerical_gradient_array(
            |x| forward(x.view(), w.view(), b.view(), param).unwrap().0,
            &x,
            &dout,
            1e-6,
        );

        let (_, cache) = forward(x.view(), w.view(), b.view(), param).unwrap();
        let (dx, _, _) = backward(dout.view(), cache).unwrap();

        assert_gradients_close(dx.view(), dx_num.view(), 1e-7);
    }
}
