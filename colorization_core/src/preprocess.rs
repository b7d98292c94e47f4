//! Input normalization and the initial chrominance estimate.
//!
//! [`prepare`] runs exactly one forward pass through the frozen predictor and
//! returns a [`PreparedImage`] that later stages only read.

use ndarray::{concatenate, Array2, Array3, ArrayD, Axis, Ix2, Ix3};

use crate::context::ColorizationContext;
use crate::decode::decode_expectation;
use crate::error::{ColorizeError, ColorizeResult};

/// Native intensity range of the input raster.
pub const INPUT_RANGE: f32 = 255.0;

/// Upper bound of LAB lightness.
pub const L_MAX: f32 = 100.0;

/// Single-channel intensity raster in [0, 255].
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleImage {
    plane: Array2<f32>,
}

impl GrayscaleImage {
    pub fn from_plane(plane: Array2<f32>) -> ColorizeResult<Self> {
        let (rows, cols) = plane.dim();
        if rows == 0 || cols == 0 {
            return Err(ColorizeError::shape("grayscale input", "[h > 0, w > 0]", plane.shape()));
        }
        Ok(Self { plane })
    }

    /// Accepts a three-slice redundant encoding of a gray image.
    ///
    /// The first axis with extent 3 is taken as the channel axis and slice 0
    /// along it is kept. A `[3, 3, w]` input therefore resolves to axis 0,
    /// which can be wrong for genuinely 3-pixel-tall images.
    pub fn from_stack(stack: Array3<f32>) -> ColorizeResult<Self> {
        let axis = stack
            .shape()
            .iter()
            .position(|&extent| extent == 3)
            .ok_or_else(|| {
                ColorizeError::shape("grayscale input", "an axis of extent 3", stack.shape())
            })?;
        Self::from_plane(stack.index_axis(Axis(axis), 0).to_owned())
    }

    /// Dispatches on rank: 2-D planes are taken as is, 3-D stacks go through
    /// [`GrayscaleImage::from_stack`].
    pub fn from_array(array: ArrayD<f32>) -> ColorizeResult<Self> {
        match array.ndim() {
            2 => {
                let plane = array
                    .into_dimensionality::<Ix2>()
                    .map_err(|err| ColorizeError::shape("grayscale input", "[h, w]", err.to_string()))?;
                Self::from_plane(plane)
            }
            3 => {
                let stack = array
                    .into_dimensionality::<Ix3>()
                    .map_err(|err| ColorizeError::shape("grayscale input", "[3, h, w]", err.to_string()))?;
                Self::from_stack(stack)
            }
            _ => Err(ColorizeError::shape(
                "grayscale input",
                "[h, w] or a 3-slice stack",
                array.shape(),
            )),
        }
    }

    pub fn from_luma(image: &image::GrayImage) -> ColorizeResult<Self> {
        let (width, height) = image.dimensions();
        let plane = Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
            image.get_pixel(col as u32, row as u32).0[0] as f32
        });
        Self::from_plane(plane)
    }

    pub fn plane(&self) -> &Array2<f32> {
        &self.plane
    }

    pub fn dims(&self) -> (usize, usize) {
        self.plane.dim()
    }

    /// Lightness in [0, 100] at native resolution.
    pub fn to_lightness(&self) -> Array2<f32> {
        self.plane.mapv(|v| (v * (L_MAX / INPUT_RANGE)).clamp(0.0, L_MAX))
    }
}

/// Output of [`prepare`]; every field is computed once and never mutated.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    original_l: Array2<f32>,
    luminance_high: Array2<f32>,
    luminance_low: Array2<f32>,
    distribution: Array3<f32>,
    chroma_mean: Array3<f32>,
    initial_lab_low: Array3<f32>,
    upsampled_lab_high: Array3<f32>,
}

impl PreparedImage {
    /// Native-resolution lightness in [0, 100].
    pub fn original_l(&self) -> &Array2<f32> {
        &self.original_l
    }

    /// Predictor-resolution lightness (256×256 by default).
    pub fn luminance_high(&self) -> &Array2<f32> {
        &self.luminance_high
    }

    /// Target-resolution lightness (64×64 by default).
    pub fn luminance_low(&self) -> &Array2<f32> {
        &self.luminance_low
    }

    /// `[bins, low, low]` predictor output.
    pub fn distribution(&self) -> &Array3<f32> {
        &self.distribution
    }

    /// `[2, low, low]` expectation decode in a*/b*.
    pub fn chroma_mean(&self) -> &Array3<f32> {
        &self.chroma_mean
    }

    /// `[3, low, low]` LAB estimate built from the expectation decode.
    pub fn initial_lab_low(&self) -> &Array3<f32> {
        &self.initial_lab_low
    }

    /// `[3, high, high]` upsampled LAB estimate whose lightness channel is
    /// exactly [`PreparedImage::luminance_high`].
    pub fn upsampled_lab_high(&self) -> &Array3<f32> {
        &self.upsampled_lab_high
    }
}

/// Normalizes `image` and derives the pretrained chrominance estimate.
pub fn prepare(ctx: &ColorizationContext, image: &GrayscaleImage) -> ColorizeResult<PreparedImage> {
    let geometry = ctx.config().geometry;
    let adapter = ctx.adapter();
    let high = (geometry.high_res, geometry.high_res);
    let low = (geometry.low_res, geometry.low_res);

    let original_l = image.to_lightness();
    let luminance_high = adapter
        .resize_plane(original_l.view(), high)
        .mapv(|v| v.clamp(0.0, L_MAX));
    let luminance_low = adapter
        .resize_plane(original_l.view(), low)
        .mapv(|v| v.clamp(0.0, L_MAX));

    let distribution = ctx.predictor().predict(luminance_high.view())?;
    let chroma_mean = decode_expectation(distribution.view(), ctx.palette())?;

    let initial_lab_low = concatenate(
        Axis(0),
        &[luminance_low.view().insert_axis(Axis(0)), chroma_mean.view()],
    )
    .map_err(|err| ColorizeError::shape("prepare", low, err.to_string()))?;

    let mut upsampled_lab_high = adapter.resize(initial_lab_low.view(), high);
    if upsampled_lab_high.dim() != (3, high.0, high.1) {
        return Err(ColorizeError::shape(
            "prepare upsample",
            (3, high.0, high.1),
            upsampled_lab_high.dim(),
        ));
    }
    upsampled_lab_high
        .index_axis_mut(Axis(0), 0)
        .assign(&luminance_high);

    tracing::debug!(
        input = ?image.dims(),
        high = geometry.high_res,
        low = geometry.low_res,
        "prepared luminance pyramid and expectation decode"
    );

    Ok(PreparedImage {
        original_l,
        luminance_high,
        luminance_low,
        distribution,
        chroma_mean,
        initial_lab_low,
        upsampled_lab_high,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_heuristic_takes_first_slice_of_first_triplet_axis() {
        let stack = Array3::from_shape_fn((5, 4, 3), |(r, c, ch)| (r * 10 + c) as f32 + ch as f32 * 100.0);
        let image = GrayscaleImage::from_stack(stack).unwrap();
        assert_eq!(image.dims(), (5, 4));
        assert_eq!(image.plane()[[2, 1]], 21.0);

        let channel_first = Array3::from_shape_fn((3, 2, 2), |(ch, _, _)| ch as f32);
        let image = GrayscaleImage::from_stack(channel_first).unwrap();
        assert!(image.plane().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn stack_without_triplet_axis_is_rejected() {
        let stack = Array3::<f32>::zeros((4, 4, 4));
        assert!(matches!(
            GrayscaleImage::from_stack(stack),
            Err(ColorizeError::InputShape { .. })
        ));
    }

    #[test]
    fn dynamic_input_dispatches_on_rank() {
        let plane = ArrayD::<f32>::zeros(vec![6, 7]);
        assert_eq!(GrayscaleImage::from_array(plane).unwrap().dims(), (6, 7));

        let stack = ArrayD::<f32>::zeros(vec![3, 6, 7]);
        assert_eq!(GrayscaleImage::from_array(stack).unwrap().dims(), (6, 7));

        let volume = ArrayD::<f32>::zeros(vec![2, 3, 6, 7]);
        assert!(GrayscaleImage::from_array(volume).is_err());
    }

    #[test]
    fn lightness_is_rescaled_and_clipped() {
        let plane = Array2::from_shape_vec((1, 3), vec![0.0, 255.0, 300.0]).unwrap();
        let lightness = GrayscaleImage::from_plane(plane).unwrap().to_lightness();
        assert_eq!(lightness[[0, 0]], 0.0);
        assert!((lightness[[0, 1]] - 100.0).abs() < 1e-4);
        assert_eq!(lightness[[0, 2]], 100.0);
    }

    #[test]
    fn luma_conversion_keeps_row_major_layout() {
        let mut luma = image::GrayImage::new(3, 2);
        luma.put_pixel(2, 1, image::Luma([200]));
        let image = GrayscaleImage::from_luma(&luma).unwrap();
        assert_eq!(image.dims(), (2, 3));
        assert_eq!(image.plane()[[1, 2]], 200.0);
    }
}
