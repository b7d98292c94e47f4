//! Frozen chrominance predictor seam.
//!
//! The pretrained network itself is supplied by the caller through
//! [`ColorPredictor`]. [`FrozenPredictor`] enforces the contract around it:
//! a `[high_res, high_res]` luminance map in [0, 100] enters, and a
//! `[bins, low_res, low_res]` per-pixel distribution leaves. Predictors take
//! `&self`, so nothing reachable from the pipeline can update their weights.

use ndarray::{Array3, ArrayView2, Axis};

use crate::config::GeometryConfig;
use crate::decode::validate_distribution;
use crate::error::{ColorizeError, ColorizeResult};

/// Tolerance on per-pixel probability sums.
pub const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Maps a luminance map to a per-pixel distribution over chrominance bins.
pub trait ColorPredictor: Send + Sync {
    fn predict(&self, luminance: ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>>;
}

impl<F> ColorPredictor for F
where
    F: Fn(ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> + Send + Sync,
{
    fn predict(&self, luminance: ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> {
        self(luminance)
    }
}

/// Contract-checking wrapper around a predictor.
pub struct FrozenPredictor<P> {
    inner: P,
    geometry: GeometryConfig,
}

impl<P: ColorPredictor> FrozenPredictor<P> {
    pub fn new(inner: P, geometry: GeometryConfig) -> Self {
        Self { inner, geometry }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: ColorPredictor> ColorPredictor for FrozenPredictor<P> {
    fn predict(&self, luminance: ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> {
        let side = self.geometry.high_res;
        if luminance.dim() != (side, side) {
            return Err(ColorizeError::shape(
                "predictor input",
                (side, side),
                luminance.dim(),
            ));
        }
        let distribution = self.inner.predict(luminance)?;
        let expected = (self.geometry.bins, self.geometry.low_res, self.geometry.low_res);
        if distribution.dim() != expected {
            return Err(ColorizeError::shape(
                "predictor output",
                expected,
                distribution.dim(),
            ));
        }

        validate_distribution(
            distribution.view(),
            self.geometry.bins,
            DISTRIBUTION_TOLERANCE,
        )?;
        Ok(distribution)
    }
}

/// Emits the uniform distribution at every pixel, independent of its input.
#[derive(Debug, Clone, Copy)]
pub struct UniformPredictor {
    pub bins: usize,
    pub low_res: usize,
}

impl UniformPredictor {
    pub fn new(geometry: &GeometryConfig) -> Self {
        Self {
            bins: geometry.bins,
            low_res: geometry.low_res,
        }
    }
}

impl ColorPredictor for UniformPredictor {
    fn predict(&self, _luminance: ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> {
        Ok(Array3::from_elem(
            (self.bins, self.low_res, self.low_res),
            1.0 / self.bins as f32,
        ))
    }
}

/// Turns a logit-producing function into a distribution with a per-pixel
/// softmax over the bin axis.
pub struct SoftmaxPredictor<F> {
    logits: F,
}

impl<F> SoftmaxPredictor<F>
where
    F: Fn(ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> + Send + Sync,
{
    pub fn new(logits: F) -> Self {
        Self { logits }
    }
}

impl<F> ColorPredictor for SoftmaxPredictor<F>
where
    F: Fn(ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> + Send + Sync,
{
    fn predict(&self, luminance: ArrayView2<'_, f32>) -> ColorizeResult<Array3<f32>> {
        let mut logits = (self.logits)(luminance)?;
        softmax_bins(&mut logits);
        Ok(logits)
    }
}

/// In-place softmax along axis 0 of a `[bins, h, w]` array.
pub fn softmax_bins(logits: &mut Array3<f32>) {
    let max = logits.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, &v| acc.max(v));
    for mut plane in logits.axis_iter_mut(Axis(0)) {
        plane.zip_mut_with(&max, |v, &m| *v = (*v - m).exp());
    }
    let sum = logits.sum_axis(Axis(0));
    for mut plane in logits.axis_iter_mut(Axis(0)) {
        plane.zip_mut_with(&sum, |v, &s| *v /= s);
    }
}
