use ndarray::{Array3, ArrayView3};
use palette::{FromColor, Lab, Srgb};

/// Converts a `[3, h, w]` LAB image into sRGB clipped to [0, 1].
///
/// # Panics
///
/// Panics if the first axis does not have extent 3.
pub fn lab_to_rgb(lab: ArrayView3<'_, f32>) -> Array3<f32> {
    assert_eq!(lab.dim().0, 3, "lab_to_rgb expects [3, h, w]");
    let (_, rows, cols) = lab.dim();
    let mut rgb = Array3::zeros((3, rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let color: Lab = Lab::new(lab[[0, row, col]], lab[[1, row, col]], lab[[2, row, col]]);
            let srgb: Srgb = Srgb::from_color(color);
            rgb[[0, row, col]] = srgb.red.clamp(0.0, 1.0);
            rgb[[1, row, col]] = srgb.green.clamp(0.0, 1.0);
            rgb[[2, row, col]] = srgb.blue.clamp(0.0, 1.0);
        }
    }

    rgb
}

/// Converts a `[3, h, w]` sRGB image in [0, 1] into LAB.
pub fn rgb_to_lab(rgb: ArrayView3<'_, f32>) -> Array3<f32> {
    assert_eq!(rgb.dim().0, 3, "rgb_to_lab expects [3, h, w]");
    let (_, rows, cols) = rgb.dim();
    let mut lab = Array3::zeros((3, rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let color: Lab = Lab::from_color(Srgb::new(
                rgb[[0, row, col]],
                rgb[[1, row, col]],
                rgb[[2, row, col]],
            ));
            lab[[0, row, col]] = color.l;
            lab[[1, row, col]] = color.a;
            lab[[2, row, col]] = color.b;
        }
    }

    lab
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_lab_maps_to_gray() {
        let mut lab = Array3::zeros((3, 1, 2));
        lab[[0, 0, 0]] = 100.0;
        lab[[0, 0, 1]] = 0.0;
        let rgb = lab_to_rgb(lab.view());

        for channel in 0..3 {
            assert!((rgb[[channel, 0, 0]] - 1.0).abs() < 1e-3);
            assert!(rgb[[channel, 0, 1]].abs() < 1e-3);
        }
    }

    #[test]
    fn out_of_gamut_values_are_clipped() {
        let mut lab = Array3::zeros((3, 1, 1));
        lab[[0, 0, 0]] = 50.0;
        lab[[1, 0, 0]] = 110.0;
        lab[[2, 0, 0]] = -110.0;
        let rgb = lab_to_rgb(lab.view());
        assert!(rgb.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rgb_lab_round_trip_in_gamut() {
        let rgb = Array3::from_shape_vec((3, 1, 1), vec![0.8f32, 0.4, 0.2]).unwrap();
        let back = lab_to_rgb(rgb_to_lab(rgb.view()).view());
        for (a, b) in rgb.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
