//! Chrominance decoding from per-pixel bin distributions.
//!
//! Both decoders are pure functions over a `[bins, h, w]` distribution and a
//! palette, costing O(pixels × bins). Outputs are always `[2, h, w]`.

use ndarray::{Array2, Array3, ArrayView3, Axis};

use crate::chroma::{ChromaPalette, ChromaScale};
use crate::error::{ColorizeError, ColorizeResult};

/// Share of the tolerance beyond which accepted sums are still reported.
const SUM_DRIFT_WARN_FRACTION: f32 = 0.1;

fn check_bins(
    stage: &'static str,
    distribution: &ArrayView3<'_, f32>,
    palette: &ChromaPalette,
) -> ColorizeResult<()> {
    let (bins, _, _) = distribution.dim();
    if bins != palette.len() {
        return Err(ColorizeError::shape(
            stage,
            format!("[{}, h, w]", palette.len()),
            distribution.shape(),
        ));
    }
    Ok(())
}

/// Expectation decode: probability-weighted mean chrominance in a*/b*.
pub fn decode_expectation(
    distribution: ArrayView3<'_, f32>,
    palette: &ChromaPalette,
) -> ColorizeResult<Array3<f32>> {
    check_bins("decode_expectation", &distribution, palette)?;
    let (_, rows, cols) = distribution.dim();
    let mut mean = Array3::zeros((2, rows, cols));

    for (bin, plane) in distribution.axis_iter(Axis(0)).enumerate() {
        let [a, b] = palette.entry(bin, ChromaScale::Lab);
        mean.index_axis_mut(Axis(0), 0).scaled_add(a, &plane);
        mean.index_axis_mut(Axis(0), 1).scaled_add(b, &plane);
    }

    Ok(mean)
}

/// Most probable bin per pixel; the lowest index wins ties.
pub fn argmax_bins(distribution: ArrayView3<'_, f32>) -> Array2<usize> {
    let (bins, rows, cols) = distribution.dim();
    Array2::from_shape_fn((rows, cols), |(row, col)| {
        let mut best = 0;
        let mut best_p = f32::NEG_INFINITY;
        for bin in 0..bins {
            let p = distribution[[bin, row, col]];
            if p > best_p {
                best_p = p;
                best = bin;
            }
        }
        best
    })
}

/// Mode decode: chrominance of the most probable bin, read in `scale`.
pub fn decode_mode(
    distribution: ArrayView3<'_, f32>,
    palette: &ChromaPalette,
    scale: ChromaScale,
) -> ColorizeResult<Array3<f32>> {
    check_bins("decode_mode", &distribution, palette)?;
    let indices = argmax_bins(distribution);
    let (rows, cols) = indices.dim();
    let mut mode = Array3::zeros((2, rows, cols));

    for ((row, col), &bin) in indices.indexed_iter() {
        let [a, b] = palette.entry(bin, scale);
        mode[[0, row, col]] = a;
        mode[[1, row, col]] = b;
    }

    Ok(mode)
}

/// Checks that `distribution` is a finite `[bins, h, w]` array whose values
/// sum to 1 (within `tolerance`) over the bin axis at every pixel.
pub fn validate_distribution(
    distribution: ArrayView3<'_, f32>,
    bins: usize,
    tolerance: f32,
) -> ColorizeResult<()> {
    if distribution.dim().0 != bins {
        return Err(ColorizeError::shape(
            "validate_distribution",
            format!("[{}, h, w]", bins),
            distribution.shape(),
        ));
    }

    if distribution.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(ColorizeError::InvalidDistribution {
            details: "probabilities must be finite and non-negative".into(),
        });
    }

    let sums = distribution.sum_axis(Axis(0));
    if let Some(((row, col), sum)) = sums
        .indexed_iter()
        .find(|(_, sum)| (**sum - 1.0).abs() > tolerance)
    {
        return Err(ColorizeError::InvalidDistribution {
            details: format!(
                "pixel ({}, {}) sums to {} (tolerance {})",
                row, col, sum, tolerance
            ),
        });
    }

    let drift = sums.iter().fold(0.0f32, |acc, sum| acc.max((sum - 1.0).abs()));
    if drift > tolerance * SUM_DRIFT_WARN_FRACTION {
        tracing::warn!(drift, tolerance, "distribution sums drift from 1 within tolerance");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::tests::lattice_palette;
    use crate::chroma::PALETTE_BINS;

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn warnings_during(check: impl FnOnce()) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, check);
        let bytes = log.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn one_hot(bin: usize, rows: usize, cols: usize) -> Array3<f32> {
        let mut dist = Array3::zeros((PALETTE_BINS, rows, cols));
        dist.index_axis_mut(Axis(0), bin).fill(1.0);
        dist
    }

    #[test]
    fn expectation_of_one_hot_is_the_entry() {
        let palette = lattice_palette();
        let dist = one_hot(77, 3, 2);
        let mean = decode_expectation(dist.view(), &palette).unwrap();
        let [a, b] = palette.entry(77, ChromaScale::Lab);

        assert_eq!(mean.dim(), (2, 3, 2));
        assert!(mean
            .index_axis(Axis(0), 0)
            .iter()
            .all(|v| (v - a).abs() < 1e-4));
        assert!(mean
            .index_axis(Axis(0), 1)
            .iter()
            .all(|v| (v - b).abs() < 1e-4));
    }

    #[test]
    fn mode_picks_most_probable_bin() {
        let palette = lattice_palette();
        let mut dist = Array3::from_elem((PALETTE_BINS, 2, 2), 0.5 / 312.0);
        dist[[12, 0, 0]] = 0.5;
        dist[[200, 1, 1]] = 0.5;

        let indices = argmax_bins(dist.view());
        assert_eq!(indices[[0, 0]], 12);
        assert_eq!(indices[[1, 1]], 200);

        let mode = decode_mode(dist.view(), &palette, ChromaScale::Unit).unwrap();
        assert_eq!(mode.dim().0, 2);
        assert_eq!(mode[[0, 0, 0]], palette.entry(12, ChromaScale::Unit)[0]);
        assert_eq!(mode[[1, 1, 1]], palette.entry(200, ChromaScale::Unit)[1]);
    }

    #[test]
    fn decoders_reject_bin_mismatch() {
        let palette = lattice_palette();
        let dist = Array3::<f32>::zeros((10, 4, 4));
        assert!(matches!(
            decode_expectation(dist.view(), &palette),
            Err(ColorizeError::InputShape { .. })
        ));
        assert!(decode_mode(dist.view(), &palette, ChromaScale::Lab).is_err());
    }

    #[test]
    fn validation_catches_unnormalized_pixels() {
        let mut dist = one_hot(0, 2, 2);
        assert!(validate_distribution(dist.view(), PALETTE_BINS, 1e-4).is_ok());

        dist[[1, 1, 0]] = 0.25;
        let err = validate_distribution(dist.view(), PALETTE_BINS, 1e-4).unwrap_err();
        assert!(err.to_string().contains("pixel (1, 0)"));
    }

    #[test]
    fn sums_drifting_within_tolerance_pass_with_a_warning() {
        let mut dist = one_hot(5, 2, 2);
        dist[[5, 1, 1]] = 1.0 + 5e-4;
        let output = warnings_during(|| {
            validate_distribution(dist.view(), PALETTE_BINS, 1e-3).unwrap();
        });
        assert!(output.contains("WARN"));
        assert!(output.contains("drift"));
    }

    #[test]
    fn exact_sums_pass_silently() {
        let dist = one_hot(5, 2, 2);
        let output = warnings_during(|| {
            validate_distribution(dist.view(), PALETTE_BINS, 1e-3).unwrap();
        });
        assert!(!output.contains("WARN"));
    }
}
