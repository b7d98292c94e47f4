//! Color-space adapter: resampling and LAB ↔ RGB conversion primitives.
//!
//! The pipeline only needs the operations on [`ColorSpaceAdapter`]; the
//! default [`BilinearAdapter`] implements them with `image`'s triangle
//! (bilinear) filter and D65 sRGB conversion through `palette`.

pub mod lab;
pub mod resize;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

pub use lab::{lab_to_rgb, rgb_to_lab};
pub use resize::{resize_bilinear, resize_plane_bilinear};

/// Resampling and color conversion used at stage boundaries.
///
/// Images are channel-first `[c, h, w]`; planes are `[h, w]`.
pub trait ColorSpaceAdapter: Send + Sync {
    fn resize(&self, image: ArrayView3<'_, f32>, size: (usize, usize)) -> Array3<f32>;

    fn resize_plane(&self, plane: ArrayView2<'_, f32>, size: (usize, usize)) -> Array2<f32>;

    /// `[3, h, w]` LAB (L in [0,100]) to sRGB clipped to [0, 1].
    fn lab_to_rgb(&self, lab: ArrayView3<'_, f32>) -> Array3<f32>;

    /// `[3, h, w]` sRGB in [0, 1] to LAB.
    fn rgb_to_lab(&self, rgb: ArrayView3<'_, f32>) -> Array3<f32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BilinearAdapter;

impl ColorSpaceAdapter for BilinearAdapter {
    fn resize(&self, image: ArrayView3<'_, f32>, size: (usize, usize)) -> Array3<f32> {
        resize_bilinear(image, size)
    }

    fn resize_plane(&self, plane: ArrayView2<'_, f32>, size: (usize, usize)) -> Array2<f32> {
        resize_plane_bilinear(plane, size)
    }

    fn lab_to_rgb(&self, lab: ArrayView3<'_, f32>) -> Array3<f32> {
        lab::lab_to_rgb(lab)
    }

    fn rgb_to_lab(&self, rgb: ArrayView3<'_, f32>) -> Array3<f32> {
        lab::rgb_to_lab(rgb)
    }
}
