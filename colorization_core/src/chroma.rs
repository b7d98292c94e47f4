//! Discrete chrominance palette shared by the predictor, the decoder and the
//! projector.
//!
//! Entries are stored in the predictor's normalized representation, where both
//! coefficients lie in [-1, 1]. Two other views are derived on demand:
//!
//! ```text
//! unit = 0.5 * (normalized + 1)      // [0, 1], prior network output space
//! lab  = normalized * AB_NORM        // true a*/b* range
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ColorizeError, ColorizeResult};

/// Number of bins in the standard quantized ab gamut.
pub const PALETTE_BINS: usize = 313;

/// Scale between normalized coefficients and true a*/b* values.
pub const AB_NORM: f32 = 110.0;

/// Numeric representation in which palette coefficients are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaScale {
    /// Stored representation, [-1, 1]
    Normalized,
    /// Shifted into [0, 1]
    Unit,
    /// Unnormalized a*/b*
    Lab,
}

impl ChromaScale {
    /// Maps a normalized coefficient into this scale.
    pub fn from_normalized(self, value: f32) -> f32 {
        match self {
            ChromaScale::Normalized => value,
            ChromaScale::Unit => 0.5 * (value + 1.0),
            ChromaScale::Lab => value * AB_NORM,
        }
    }
}

/// Converts a unit-scale chrominance value into a*/b*.
pub fn unit_to_lab(value: f32) -> f32 {
    (2.0 * value - 1.0) * AB_NORM
}

/// Converts an a*/b* value into unit scale.
pub fn lab_to_unit(value: f32) -> f32 {
    0.5 * (value / AB_NORM + 1.0)
}

/// Immutable ordered set of (a, b) coefficient pairs.
///
/// Cloning is cheap; all clones share the same storage and nothing can mutate
/// it after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaPalette {
    entries: Arc<[[f32; 2]]>,
}

impl ChromaPalette {
    /// Builds a palette from normalized pairs, requiring exactly
    /// [`PALETTE_BINS`] finite entries within [-1, 1].
    pub fn from_pairs(pairs: Vec<[f32; 2]>) -> ColorizeResult<Self> {
        Self::with_bins(pairs, PALETTE_BINS)
    }

    /// Same as [`ChromaPalette::from_pairs`] with an explicit bin count.
    pub fn with_bins(pairs: Vec<[f32; 2]>, bins: usize) -> ColorizeResult<Self> {
        if pairs.len() != bins {
            return Err(ColorizeError::InvalidPalette {
                details: format!("expected {} entries, found {}", bins, pairs.len()),
            });
        }

        if let Some((idx, pair)) = pairs
            .iter()
            .enumerate()
            .find(|(_, pair)| pair.iter().any(|v| !v.is_finite() || v.abs() > 1.0))
        {
            return Err(ColorizeError::InvalidPalette {
                details: format!(
                    "entry {} = {:?} is outside the normalized range [-1, 1]",
                    idx, pair
                ),
            });
        }

        Ok(Self {
            entries: pairs.into(),
        })
    }

    /// Parses a JSON array of `[a, b]` pairs.
    pub fn from_json_str(json: &str) -> ColorizeResult<Self> {
        let pairs: Vec<[f32; 2]> =
            serde_json::from_str(json).map_err(|err| ColorizeError::InvalidPalette {
                details: err.to_string(),
            })?;
        Self::from_pairs(pairs)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> ColorizeResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Parses a JSON array of `[a*, b*]` pairs in true Lab units, such as the
    /// quantized gamut centres distributed as `pts_in_hull.npy`.
    pub fn from_lab_json_str(json: &str) -> ColorizeResult<Self> {
        let pairs: Vec<[f32; 2]> =
            serde_json::from_str(json).map_err(|err| ColorizeError::InvalidPalette {
                details: err.to_string(),
            })?;
        Self::from_pairs(
            pairs
                .into_iter()
                .map(|[a, b]| [a / AB_NORM, b / AB_NORM])
                .collect(),
        )
    }

    pub fn load_lab_json<P: AsRef<Path>>(path: P) -> ColorizeResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_lab_json_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized coefficients in stored order.
    pub fn entries(&self) -> &[[f32; 2]] {
        &self.entries
    }

    /// Returns entry `index` in the requested scale.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn entry(&self, index: usize, scale: ChromaScale) -> [f32; 2] {
        let [a, b] = self.entries[index];
        [scale.from_normalized(a), scale.from_normalized(b)]
    }

    /// Arithmetic mean of all entries in the requested scale.
    pub fn mean(&self, scale: ChromaScale) -> [f32; 2] {
        let n = self.entries.len().max(1) as f32;
        let (sum_a, sum_b) = self
            .entries
            .iter()
            .fold((0.0f32, 0.0f32), |(sa, sb), [a, b]| (sa + a, sb + b));
        [
            scale.from_normalized(sum_a / n),
            scale.from_normalized(sum_b / n),
        ]
    }

    /// Index of the entry nearest to a unit-scale (a, b) pair.
    ///
    /// Squared Euclidean distance in unit space; the lowest index wins ties.
    pub fn nearest(&self, a: f32, b: f32) -> usize {
        let mut best_idx = 0;
        let mut best_dist = f32::INFINITY;
        for (idx, [ea, eb]) in self.entries.iter().enumerate() {
            let da = ChromaScale::Unit.from_normalized(*ea) - a;
            let db = ChromaScale::Unit.from_normalized(*eb) - b;
            let dist = da * da + db * db;
            if dist < best_dist {
                best_dist = dist;
                best_idx = idx;
            }
        }
        best_idx
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic palette spread over the normalized square.
    pub(crate) fn lattice_palette() -> ChromaPalette {
        let pairs = (0..PALETTE_BINS)
            .map(|i| {
                let a = ((i % 18) as f32 / 17.0) * 2.0 - 1.0;
                let b = ((i / 18) as f32 / 17.0) * 2.0 - 1.0;
                [a, b]
            })
            .collect();
        ChromaPalette::from_pairs(pairs).expect("lattice fits the normalized range")
    }

    #[test]
    fn palette_requires_exact_bin_count() {
        let result = ChromaPalette::from_pairs(vec![[0.0, 0.0]; 312]);
        assert!(matches!(result, Err(ColorizeError::InvalidPalette { .. })));

        let palette = lattice_palette();
        assert_eq!(palette.len(), PALETTE_BINS);
    }

    #[test]
    fn palette_rejects_out_of_range_entries() {
        let mut pairs = vec![[0.0, 0.0]; PALETTE_BINS];
        pairs[10] = [1.5, 0.0];
        assert!(ChromaPalette::from_pairs(pairs).is_err());

        let mut pairs = vec![[0.0, 0.0]; PALETTE_BINS];
        pairs[3] = [f32::NAN, 0.0];
        assert!(ChromaPalette::from_pairs(pairs).is_err());
    }

    #[test]
    fn scales_agree_with_conversions() {
        let palette = lattice_palette();
        let [na, nb] = palette.entry(40, ChromaScale::Normalized);
        let [ua, ub] = palette.entry(40, ChromaScale::Unit);
        let [la, lb] = palette.entry(40, ChromaScale::Lab);

        assert!((ua - 0.5 * (na + 1.0)).abs() < 1e-6);
        assert!((la - na * AB_NORM).abs() < 1e-4);
        assert!((unit_to_lab(ua) - la).abs() < 1e-3);
        assert!((lab_to_unit(lb) - ub).abs() < 1e-6);
    }

    #[test]
    fn nearest_prefers_lowest_index_on_ties() {
        let mut pairs = vec![[0.9, 0.9]; PALETTE_BINS];
        pairs[5] = [0.0, 0.0];
        pairs[9] = [0.0, 0.0];
        let palette = ChromaPalette::from_pairs(pairs).unwrap();
        assert_eq!(palette.nearest(0.5, 0.5), 5);
    }

    #[test]
    fn json_round_trip_preserves_order() {
        let palette = lattice_palette();
        let json = serde_json::to_string(palette.entries()).unwrap();
        let parsed = ChromaPalette::from_json_str(&json).unwrap();
        assert_eq!(parsed, palette);
    }

    #[test]
    fn lab_json_is_scaled_into_normalized_coefficients() {
        let pairs: Vec<[f32; 2]> = (0..PALETTE_BINS)
            .map(|i| [-90.0 + (i % 19) as f32 * 10.0, -110.0 + (i / 19) as f32 * 10.0])
            .collect();
        let json = serde_json::to_string(&pairs).unwrap();
        let palette = ChromaPalette::from_lab_json_str(&json).unwrap();

        let [a, b] = palette.entry(20, ChromaScale::Lab);
        assert!((a - pairs[20][0]).abs() < 1e-3);
        assert!((b - pairs[20][1]).abs() < 1e-3);
        assert!(palette.entries().iter().flatten().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn lab_json_outside_the_gamut_is_rejected() {
        let mut pairs = vec![[0.0f32, 0.0]; PALETTE_BINS];
        pairs[0] = [130.0, 0.0];
        let json = serde_json::to_string(&pairs).unwrap();
        assert!(ChromaPalette::from_lab_json_str(&json).is_err());
    }

    #[test]
    fn clones_share_storage() {
        let palette = lattice_palette();
        let clone = palette.clone();
        assert!(std::ptr::eq(
            palette.entries().as_ptr(),
            clone.entries().as_ptr()
        ));
    }
}
