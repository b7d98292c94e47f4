use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

type PlaneBuffer = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Triangle-filter resize of a single `[h, w]` plane.
///
/// `imageops` clamps float samples to [0, 1], so the plane is mapped onto
/// that range by its own extrema and mapped back afterwards. The filter
/// weights are non-negative, so output values stay within the input range.
///
/// # Panics
///
/// Panics if the input or the requested size has a zero extent.
pub fn resize_plane_bilinear(plane: ArrayView2<'_, f32>, size: (usize, usize)) -> Array2<f32> {
    let (in_rows, in_cols) = plane.dim();
    let (out_rows, out_cols) = size;
    assert!(
        in_rows > 0 && in_cols > 0 && out_rows > 0 && out_cols > 0,
        "resize requires non-empty extents"
    );

    if (in_rows, in_cols) == size {
        return plane.to_owned();
    }

    let (lo, hi) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    if !range.is_finite() || range <= 0.0 {
        return Array2::from_elem(size, lo);
    }

    let buffer: PlaneBuffer = ImageBuffer::from_fn(in_cols as u32, in_rows as u32, |x, y| {
        Luma([(plane[[y as usize, x as usize]] - lo) / range])
    });
    let resized = imageops::resize(&buffer, out_cols as u32, out_rows as u32, FilterType::Triangle);

    Array2::from_shape_fn(size, |(row, col)| {
        resized.get_pixel(col as u32, row as u32)[0] * range + lo
    })
}

/// Triangle-filter resize of every channel of a `[c, h, w]` image.
pub fn resize_bilinear(image: ArrayView3<'_, f32>, size: (usize, usize)) -> Array3<f32> {
    let channels = image.dim().0;
    let mut out = Array3::zeros((channels, size.0, size.1));
    for (src, mut dst) in image
        .axis_iter(Axis(0))
        .zip(out.axis_iter_mut(Axis(0)))
    {
        dst.assign(&resize_plane_bilinear(src, size));
    }
    out
}
