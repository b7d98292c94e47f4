//! Composite refinement loss with analytic gradients.
//!
//! ```text
//! L = MSE(D(out), target) + MSE(out[0], lum) + tv_weight · Σ_c Σ sqrt(S_c)
//! S_c = ε + γ·Δh(lum)² + γ·Δv(lum)² + Δh(ab_c)² + Δv(ab_c)²
//! ```
//!
//! `lum` is the high-resolution luminance divided by 100. Differences are
//! forward differences taken over the common `(H-1)×(W-1)` crop.

use ndarray::{s, Array, Array2, Array3, ArrayView, ArrayView2, ArrayView3, Axis, Dimension, Zip};
use serde::Serialize;

use crate::config::LossConfig;
use crate::error::{ColorizeError, ColorizeResult};
use crate::preprocess::L_MAX;
use crate::prior::LanczosDownsampler;

/// Per-term values of one loss evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LossBreakdown {
    pub fidelity: f32,
    pub luminance: f32,
    pub coupled_tv: f32,
    pub total: f32,
}

impl LossBreakdown {
    pub fn is_finite(&self) -> bool {
        self.fidelity.is_finite()
            && self.luminance.is_finite()
            && self.coupled_tv.is_finite()
            && self.total.is_finite()
    }
}

/// Mean squared error and its gradient with respect to `prediction`.
pub fn mse_with_gradient<D: Dimension>(
    prediction: ArrayView<'_, f32, D>,
    target: ArrayView<'_, f32, D>,
) -> ColorizeResult<(f32, Array<f32, D>)> {
    if prediction.shape() != target.shape() {
        return Err(ColorizeError::shape("mse", target.shape(), prediction.shape()));
    }

    let n = prediction.len().max(1) as f32;
    let diff = Zip::from(&prediction)
        .and(&target)
        .map_collect(|&p, &t| p - t);
    let value = diff.iter().map(|d| d * d).sum::<f32>() / n;
    let grad = diff.mapv(|d| 2.0 * d / n);
    Ok((value, grad))
}

/// Luminance-coupled total variation of the two chrominance channels.
///
/// Returns the weighted penalty and its gradient with respect to `ab`.
pub fn coupled_tv(
    lum: ArrayView2<'_, f32>,
    ab: ArrayView3<'_, f32>,
    params: &LossConfig,
) -> ColorizeResult<(f32, Array3<f32>)> {
    let (channels, rows, cols) = ab.dim();
    if lum.dim() != (rows, cols) {
        return Err(ColorizeError::shape("coupled tv", (rows, cols), lum.dim()));
    }

    let mut grad = Array3::zeros(ab.dim());
    if rows < 2 || cols < 2 {
        return Ok((0.0, grad));
    }
    let (crop_r, crop_c) = (rows - 1, cols - 1);

    let here = lum.slice(s![..crop_r, ..crop_c]);
    let right = lum.slice(s![..crop_r, 1..]);
    let below = lum.slice(s![1.., ..crop_c]);
    let mut edge = Array2::zeros((crop_r, crop_c));
    Zip::from(&mut edge)
        .and(&here)
        .and(&right)
        .and(&below)
        .for_each(|e, &l, &lr, &lb| {
            let dh = lr - l;
            let dv = lb - l;
            *e = params.epsilon + params.gamma * (dh * dh + dv * dv);
        });

    let mut value = 0.0f32;
    for c in 0..channels {
        let plane = ab.index_axis(Axis(0), c);
        let mut g = grad.index_axis_mut(Axis(0), c);
        for y in 0..crop_r {
            for x in 0..crop_c {
                let centre = plane[[y, x]];
                let dh = plane[[y, x + 1]] - centre;
                let dv = plane[[y + 1, x]] - centre;
                let root = (edge[[y, x]] + dh * dh + dv * dv).sqrt();
                value += root;

                // d sqrt(S) / d dh = dh / sqrt(S)
                let scale = params.tv_weight / root;
                g[[y, x + 1]] += scale * dh;
                g[[y + 1, x]] += scale * dv;
                g[[y, x]] -= scale * (dh + dv);
            }
        }
    }

    Ok((params.tv_weight * value, grad))
}

/// Evaluates the full refinement loss for a `[3, H, W]` unit-scale output.
///
/// `luminance_high` is in [0, 100] at `H×W`; `target` is `[3, H/f, W/f]`.
/// The returned gradient has the shape of `output`.
pub fn composite_loss(
    output: ArrayView3<'_, f32>,
    target: ArrayView3<'_, f32>,
    luminance_high: ArrayView2<'_, f32>,
    downsampler: &LanczosDownsampler,
    params: &LossConfig,
) -> ColorizeResult<(LossBreakdown, Array3<f32>)> {
    let (channels, rows, cols) = output.dim();
    if channels != 3 || luminance_high.dim() != (rows, cols) {
        return Err(ColorizeError::shape(
            "composite loss",
            format!("[3, {}, {}]", luminance_high.nrows(), luminance_high.ncols()),
            output.dim(),
        ));
    }

    let downsampled = downsampler.forward(output)?;
    if downsampled.dim() != target.dim() {
        return Err(ColorizeError::shape(
            "composite loss target",
            downsampled.dim(),
            target.dim(),
        ));
    }

    let (fidelity, grad_low) = mse_with_gradient(downsampled.view(), target)?;
    let mut grad = downsampler.backward(grad_low.view(), (rows, cols))?;

    let lum = luminance_high.mapv(|v| v / L_MAX);
    let (luminance, grad_l) = mse_with_gradient(output.index_axis(Axis(0), 0), lum.view())?;
    grad.index_axis_mut(Axis(0), 0).scaled_add(1.0, &grad_l);

    let (coupled, grad_ab) = coupled_tv(lum.view(), output.slice(s![1..3, .., ..]), params)?;
    grad.slice_mut(s![1..3, .., ..]).scaled_add(1.0, &grad_ab);

    let breakdown = LossBreakdown {
        fidelity,
        luminance,
        coupled_tv: coupled,
        total: fidelity + luminance + coupled,
    };
    Ok((breakdown, grad))
}
