//! Fixed-kernel Lanczos-2 downsampler and its adjoint.
//!
//! The kernel is the separable Lanczos window with support 2, sampled at
//! half-pixel phase over `4 * factor` taps and normalized to unit sum. Inputs
//! are replicate-padded by `(taps - factor) / 2` on each side so that an
//! `n`-pixel axis maps to exactly `n / factor` outputs.

use std::f32::consts::PI;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::error::{ColorizeError, ColorizeResult};

const LANCZOS_SUPPORT: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct LanczosDownsampler {
    factor: usize,
    kernel: Vec<f32>,
    pad: usize,
}

impl LanczosDownsampler {
    /// # Panics
    ///
    /// Panics if `factor` is zero.
    pub fn new(factor: usize) -> Self {
        assert!(factor > 0, "downsampling factor must be positive");
        let kernel = lanczos_kernel(factor);
        let pad = (kernel.len() - factor) / 2;
        Self {
            factor,
            kernel,
            pad,
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    /// Output extent for an `n`-pixel axis.
    pub fn output_len(&self, n: usize) -> usize {
        (n + 2 * self.pad).saturating_sub(self.kernel.len()) / self.factor + 1
    }

    fn check(&self, stage: &'static str, rows: usize, cols: usize) -> ColorizeResult<(usize, usize)> {
        if rows % self.factor != 0
            || cols % self.factor != 0
            || self.output_len(rows) != rows / self.factor
            || self.output_len(cols) != cols / self.factor
        {
            return Err(ColorizeError::shape(
                stage,
                format!("extents divisible by {}", self.factor),
                (rows, cols),
            ));
        }
        Ok((rows / self.factor, cols / self.factor))
    }

    /// Weighted source indices for every output position along an axis.
    fn taps(&self, n: usize) -> Vec<Vec<(usize, f32)>> {
        (0..n / self.factor)
            .map(|out| {
                self.kernel
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| {
                        let src = (out * self.factor + k) as isize - self.pad as isize;
                        (src.clamp(0, n as isize - 1) as usize, w)
                    })
                    .collect()
            })
            .collect()
    }

    pub fn forward_plane(&self, plane: ArrayView2<'_, f32>) -> ColorizeResult<Array2<f32>> {
        let (rows, cols) = plane.dim();
        let (out_rows, out_cols) = self.check("downsample", rows, cols)?;
        let row_taps = self.taps(rows);
        let col_taps = self.taps(cols);

        let mut horizontal = Array2::zeros((rows, out_cols));
        for row in 0..rows {
            for (col, taps) in col_taps.iter().enumerate() {
                horizontal[[row, col]] = taps.iter().map(|&(src, w)| w * plane[[row, src]]).sum();
            }
        }

        let mut out = Array2::zeros((out_rows, out_cols));
        for (row, taps) in row_taps.iter().enumerate() {
            for &(src, w) in taps {
                out.row_mut(row).scaled_add(w, &horizontal.row(src));
            }
        }
        Ok(out)
    }

    /// Adjoint of [`LanczosDownsampler::forward_plane`]: maps a gradient on
    /// the `[rows / f, cols / f]` output back onto the `[rows, cols]` input.
    pub fn backward_plane(
        &self,
        grad: ArrayView2<'_, f32>,
        input_dim: (usize, usize),
    ) -> ColorizeResult<Array2<f32>> {
        let (rows, cols) = input_dim;
        let expected = self.check("downsample backward", rows, cols)?;
        if grad.dim() != expected {
            return Err(ColorizeError::shape("downsample backward", expected, grad.dim()));
        }
        let row_taps = self.taps(rows);
        let col_taps = self.taps(cols);

        let mut horizontal = Array2::zeros((rows, expected.1));
        for (row, taps) in row_taps.iter().enumerate() {
            for &(src, w) in taps {
                horizontal.row_mut(src).scaled_add(w, &grad.row(row));
            }
        }

        let mut out = Array2::zeros((rows, cols));
        for row in 0..rows {
            for (col, taps) in col_taps.iter().enumerate() {
                let g = horizontal[[row, col]];
                for &(src, w) in taps {
                    out[[row, src]] += w * g;
                }
            }
        }
        Ok(out)
    }

    /// Downsamples every channel of a `[c, h, w]` image.
    pub fn forward(&self, image: ArrayView3<'_, f32>) -> ColorizeResult<Array3<f32>> {
        let (channels, rows, cols) = image.dim();
        let (out_rows, out_cols) = self.check("downsample", rows, cols)?;
        let mut out = Array3::zeros((channels, out_rows, out_cols));
        for (src, mut dst) in image.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            dst.assign(&self.forward_plane(src)?);
        }
        Ok(out)
    }

    pub fn backward(
        &self,
        grad: ArrayView3<'_, f32>,
        input_dim: (usize, usize),
    ) -> ColorizeResult<Array3<f32>> {
        let channels = grad.dim().0;
        let mut out = Array3::zeros((channels, input_dim.0, input_dim.1));
        for (src, mut dst) in grad.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            dst.assign(&self.backward_plane(src, input_dim)?);
        }
        Ok(out)
    }
}

fn lanczos_weight(distance: f32) -> f32 {
    if distance == 0.0 {
        return 1.0;
    }
    let x = PI * distance;
    LANCZOS_SUPPORT * x.sin() * (x / LANCZOS_SUPPORT).sin() / (x * x)
}

/// Half-pixel-phase Lanczos-2 taps for `factor`, normalized to unit sum.
fn lanczos_kernel(factor: usize) -> Vec<f32> {
    let width = 4 * factor + 1;
    let center = (width + 1) as f32 / 2.0;
    let mut kernel: Vec<f32> = (1..width)
        .map(|i| lanczos_weight((i as f32 + 0.5 - center).abs() / factor as f32))
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn kernel_is_symmetric_and_normalized() {
        let down = LanczosDownsampler::new(4);
        let kernel = down.kernel();
        assert_eq!(kernel.len(), 16);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-6);
        }
        assert_eq!(down.output_len(256), 64);
    }

    #[test]
    fn constant_image_stays_constant() {
        let down = LanczosDownsampler::new(4);
        let image = Array3::from_elem((3, 32, 32), 0.7f32);
        let out = down.forward(image.view()).unwrap();
        assert_eq!(out.dim(), (3, 8, 8));
        assert!(out.iter().all(|v| (v - 0.7).abs() < 1e-5));
    }

    #[test]
    fn rejects_indivisible_extent() {
        let down = LanczosDownsampler::new(4);
        let image = Array3::<f32>::zeros((3, 30, 32));
        assert!(matches!(
            down.forward(image.view()),
            Err(ColorizeError::InputShape { .. })
        ));
    }

    #[test]
    fn backward_is_the_adjoint() {
        // <D x, y> == <x, D^T y>
        let down = LanczosDownsampler::new(4);
        let mut rng = StdRng::seed_from_u64(9);
        let x = Array2::from_shape_fn((16, 24), |_| rng.gen::<f32>() - 0.5);
        let y = Array2::from_shape_fn((4, 6), |_| rng.gen::<f32>() - 0.5);

        let dx = down.forward_plane(x.view()).unwrap();
        let dty = down.backward_plane(y.view(), (16, 24)).unwrap();

        let lhs: f32 = (&dx * &y).sum();
        let rhs: f32 = (&x * &dty).sum();
        assert!((lhs - rhs).abs() < 1e-4, "{lhs} vs {rhs}");
    }
}
