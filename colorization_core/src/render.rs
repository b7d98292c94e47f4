//! Final rendering at the input's native resolution.

use std::io;
use std::path::Path;

use ndarray::{s, Array3, ArrayView2, ArrayView3, Axis};
use plotters::prelude::*;

use crate::chroma::unit_to_lab;
use crate::context::ColorizationContext;
use crate::error::{ColorizeError, ColorizeResult};
use crate::optimize::ColorizationOutcome;
use crate::preprocess::{PreparedImage, L_MAX};

/// Channel-first `[3, h, w]` sRGB raster with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub pixels: Array3<f32>,
}

impl RgbImage {
    pub fn dims(&self) -> (usize, usize) {
        let (_, rows, cols) = self.pixels.dim();
        (rows, cols)
    }

    pub fn pixel(&self, row: usize, col: usize) -> [u8; 3] {
        [
            float_to_byte(self.pixels[[0, row, col]]),
            float_to_byte(self.pixels[[1, row, col]]),
            float_to_byte(self.pixels[[2, row, col]]),
        ]
    }

    pub fn to_png<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let (rows, cols) = self.dims();
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let backend = BitMapBackend::new(path, (cols as u32, rows as u32));
        let drawing_area = backend.into_drawing_area();
        drawing_area
            .fill(&BLACK)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        for row in 0..rows {
            for col in 0..cols {
                let [r, g, b] = self.pixel(row, col);
                drawing_area
                    .draw_pixel((col as i32, row as i32), &RGBColor(r, g, b))
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            }
        }

        drawing_area
            .present()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }
}

fn float_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Unit-scale network output to LAB: L × 100, a*/b* via [`unit_to_lab`].
pub fn output_to_lab(output: ArrayView3<'_, f32>) -> ColorizeResult<Array3<f32>> {
    if output.dim().0 != 3 {
        return Err(ColorizeError::shape("output_to_lab", "[3, h, w]", output.dim()));
    }
    let mut lab = output.to_owned();
    lab.index_axis_mut(Axis(0), 0).mapv_inplace(|v| v * L_MAX);
    lab.slice_mut(s![1..3, .., ..]).mapv_inplace(unit_to_lab);
    Ok(lab)
}

fn to_native(
    ctx: &ColorizationContext,
    lab: ArrayView3<'_, f32>,
    lightness: ArrayView2<'_, f32>,
) -> RgbImage {
    let adapter = ctx.adapter();
    let mut native = adapter.resize(lab, lightness.dim());
    native.index_axis_mut(Axis(0), 0).assign(&lightness);
    RgbImage {
        pixels: adapter.lab_to_rgb(native.view()),
    }
}

/// Refined colorization: the final estimate resized to the input size with
/// the original lightness restored.
pub fn render_refined(
    ctx: &ColorizationContext,
    prepared: &PreparedImage,
    outcome: &ColorizationOutcome,
) -> ColorizeResult<RgbImage> {
    let lab = output_to_lab(outcome.output.view())?;
    Ok(to_native(ctx, lab.view(), prepared.original_l().view()))
}

/// Colorization from the pretrained predictor alone (expectation decode).
pub fn render_baseline(ctx: &ColorizationContext, prepared: &PreparedImage) -> RgbImage {
    to_native(
        ctx,
        prepared.initial_lab_low().view(),
        prepared.original_l().view(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::tests::lattice_palette;
    use crate::config::{ColorizerConfig, GeometryConfig};
    use crate::predictor::UniformPredictor;
    use crate::preprocess::{prepare, GrayscaleImage};
    use ndarray::Array2;

    #[test]
    fn neutral_output_maps_to_gray_lab() {
        let output = Array3::from_shape_fn((3, 2, 2), |(c, _, _)| if c == 0 { 0.25 } else { 0.5 });
        let lab = output_to_lab(output.view()).unwrap();
        assert!(lab.index_axis(Axis(0), 0).iter().all(|v| (v - 25.0).abs() < 1e-4));
        assert!(lab.slice(s![1..3, .., ..]).iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn renders_keep_native_size() {
        let config = ColorizerConfig {
            geometry: GeometryConfig {
                high_res: 8,
                low_res: 2,
                bins: 313,
            },
            ..ColorizerConfig::default()
        };
        let predictor = UniformPredictor::new(&config.geometry);
        let ctx = ColorizationContext::new(config, lattice_palette(), predictor).unwrap();
        let plane = Array2::from_shape_fn((5, 7), |(r, c)| (r * 30 + c * 10) as f32);
        let prepared = prepare(&ctx, &GrayscaleImage::from_plane(plane).unwrap()).unwrap();

        let baseline = render_baseline(&ctx, &prepared);
        assert_eq!(baseline.dims(), (5, 7));
        assert!(baseline.pixels.iter().all(|v| (0.0..=1.0).contains(v)));

        let outcome = ColorizationOutcome {
            output: Array3::from_elem((3, 8, 8), 0.5),
            target: Array3::zeros((3, 2, 2)),
            trace: Vec::new(),
            reprojections: Vec::new(),
        };
        let refined = render_refined(&ctx, &prepared, &outcome).unwrap();
        assert_eq!(refined.dims(), (5, 7));
        // neutral chroma renders as gray
        let [r, g, b] = refined.pixel(4, 6);
        assert!((r as i32 - g as i32).abs() <= 1 && (g as i32 - b as i32).abs() <= 1);
    }

    #[test]
    fn png_has_requested_dimensions() {
        let image = RgbImage {
            pixels: Array3::from_shape_fn((3, 3, 4), |(c, r, _)| (c + r) as f32 / 5.0),
        };
        let path = std::env::temp_dir().join(format!(
            "colorization_render_{}.png",
            crate::logging::timestamp_ms()
        ));
        image.to_png(&path).unwrap();
        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 3));
        std::fs::remove_file(path).ok();
    }
}
