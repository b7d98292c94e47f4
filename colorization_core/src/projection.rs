//! Nearest-palette re-projection of unit-scale LAB estimates.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::chroma::{ChromaPalette, ChromaScale};
use crate::decode::decode_mode;
use crate::error::{ColorizeError, ColorizeResult};
use crate::preprocess::L_MAX;

fn with_lightness(chroma: ArrayView3<'_, f32>, luminance: ArrayView2<'_, f32>) -> Array3<f32> {
    let (_, rows, cols) = chroma.dim();
    let mut out = Array3::ones((3, rows, cols));
    out.index_axis_mut(Axis(0), 0)
        .assign(&luminance.mapv(|v| v / L_MAX));
    out.slice_mut(ndarray::s![1..3, .., ..]).assign(&chroma);
    out
}

/// Replaces the chrominance of every pixel of a `[3, h, w]` unit-scale image
/// with its nearest palette entry, and channel 0 with `luminance / 100`.
///
/// The input's own channel 0 is ignored. Projecting an already projected
/// image returns it unchanged.
pub fn project(
    image: ArrayView3<'_, f32>,
    palette: &ChromaPalette,
    luminance: ArrayView2<'_, f32>,
) -> ColorizeResult<Array3<f32>> {
    let (channels, rows, cols) = image.dim();
    if channels != 3 || luminance.dim() != (rows, cols) {
        return Err(ColorizeError::shape(
            "projection",
            format!("[3, {}, {}]", luminance.nrows(), luminance.ncols()),
            image.dim(),
        ));
    }

    let indices = Array2::from_shape_fn((rows, cols), |(r, c)| {
        palette.nearest(image[[1, r, c]], image[[2, r, c]])
    });
    let chroma = Array3::from_shape_fn((2, rows, cols), |(ch, r, c)| {
        palette.entry(indices[[r, c]], ChromaScale::Unit)[ch]
    });

    Ok(with_lightness(chroma.view(), luminance))
}

/// First fidelity target: the mode decode in unit scale, stacked under the
/// low-resolution lightness.
pub fn initial_target(
    distribution: ArrayView3<'_, f32>,
    palette: &ChromaPalette,
    luminance: ArrayView2<'_, f32>,
) -> ColorizeResult<Array3<f32>> {
    let (_, rows, cols) = distribution.dim();
    if luminance.dim() != (rows, cols) {
        return Err(ColorizeError::shape("initial target", (rows, cols), luminance.dim()));
    }
    let mode = decode_mode(distribution, palette, ChromaScale::Unit)?;
    Ok(with_lightness(mode.view(), luminance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::tests::lattice_palette;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_image(seed: u64, size: usize) -> Array3<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array3::from_shape_fn((3, size, size), |_| rng.gen::<f32>())
    }

    #[test]
    fn projection_is_idempotent() {
        let palette = lattice_palette();
        let lum = Array2::from_elem((6, 6), 42.0f32);
        let once = project(random_image(1, 6).view(), &palette, lum.view()).unwrap();
        let twice = project(once.view(), &palette, lum.view()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn projected_pixels_are_palette_entries() {
        let palette = lattice_palette();
        let lum = Array2::from_shape_fn((5, 5), |(r, c)| (r * 20 + c) as f32);
        let projected = project(random_image(2, 5).view(), &palette, lum.view()).unwrap();

        let entries: Vec<[f32; 2]> = (0..palette.len())
            .map(|idx| palette.entry(idx, ChromaScale::Unit))
            .collect();
        for r in 0..5 {
            for c in 0..5 {
                let pair = [projected[[1, r, c]], projected[[2, r, c]]];
                assert!(entries.contains(&pair), "{pair:?} not in palette");
                assert_eq!(projected[[0, r, c]], lum[[r, c]] / L_MAX);
            }
        }
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let mut pairs = vec![[0.5f32, 0.5]; 313];
        pairs[0] = [-0.5, 0.0];
        pairs[1] = [0.5, 0.0];
        let palette = ChromaPalette::from_pairs(pairs).unwrap();

        // Unit-scale (0.5, 0.5) is equidistant from entries 0 and 1.
        let image = Array3::from_elem((3, 1, 1), 0.5f32);
        let lum = Array2::zeros((1, 1));
        let projected = project(image.view(), &palette, lum.view()).unwrap();
        assert_eq!(projected[[1, 0, 0]], 0.25);
        assert_eq!(projected[[2, 0, 0]], 0.5);
    }

    #[test]
    fn initial_target_uses_mode_in_unit_scale() {
        let palette = lattice_palette();
        let mut distribution = Array3::zeros((313, 2, 2));
        distribution.index_axis_mut(Axis(0), 100).fill(1.0);
        let lum = Array2::from_elem((2, 2), 50.0f32);

        let target = initial_target(distribution.view(), &palette, lum.view()).unwrap();
        let expected = palette.entry(100, ChromaScale::Unit);
        assert!(target.index_axis(Axis(0), 0).iter().all(|v| *v == 0.5));
        assert!(target.index_axis(Axis(0), 1).iter().all(|v| *v == expected[0]));
        assert!(target.index_axis(Axis(0), 2).iter().all(|v| *v == expected[1]));
    }

    #[test]
    fn wrong_channel_count_is_rejected() {
        let palette = lattice_palette();
        let image = Array3::zeros((2, 4, 4));
        let lum = Array2::zeros((4, 4));
        assert!(project(image.view(), &palette, lum.view()).is_err());
    }
}
