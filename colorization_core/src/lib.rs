//! # Colorization Core
//!
//! Grayscale image colorization in two stages. A frozen predictor assigns
//! every pixel a distribution over a 313-entry chrominance palette; a
//! randomly initialized prior network is then fitted to that estimate per
//! image under a luminance-coupled total-variation loss, with the fidelity
//! target periodically re-projected onto the palette.
//!
//! ## Quick Start
//!
//! ```rust
//! use colorization_core::{
//!     prepare, render_refined, ChromaPalette, ColorizationContext, ColorizerConfig,
//!     GeometryConfig, GrayscaleImage, PriorOptimizer, UniformPredictor,
//! };
//! use ndarray::Array2;
//!
//! let mut config = ColorizerConfig::default();
//! config.geometry = GeometryConfig { high_res: 16, low_res: 4, bins: 313 };
//! config.schedule.num_iter = 5;
//! config.prior.input_channels = 4;
//! config.prior.hidden_channels = 4;
//!
//! let palette = ChromaPalette::from_pairs(
//!     (0..313).map(|i| [(i % 19) as f32 / 9.0 - 1.0, (i / 19) as f32 / 8.0 - 1.0]).collect(),
//! )
//! .unwrap();
//! let predictor = UniformPredictor::new(&config.geometry);
//! let ctx = ColorizationContext::new(config, palette, predictor).unwrap();
//!
//! let image = GrayscaleImage::from_plane(Array2::from_elem((12, 20), 128.0)).unwrap();
//! let prepared = prepare(&ctx, &image).unwrap();
//! let outcome = PriorOptimizer::new(&ctx, &prepared).unwrap().run().unwrap();
//! let rgb = render_refined(&ctx, &prepared, &outcome).unwrap();
//!
//! assert_eq!(outcome.iterations(), 5);
//! assert_eq!(rgb.dims(), (12, 20));
//! ```
//!
//! ## Core Modules
//!
//! - [`config`] - Pipeline configuration via TOML
//! - [`chroma`] / [`decode`] - Palette and distribution decoding
//! - [`preprocess`] - Luminance pyramid and initial estimate
//! - [`prior`] / [`loss`] / [`optimize`] - Deep-prior refinement
//! - [`projection`] - Nearest-palette re-anchoring
//! - [`logging`] - JSON line-delimited run traces

pub mod chroma;
pub mod color;
pub mod config;
pub mod context;
pub mod decode;
pub mod error;
pub mod logging;
pub mod loss;
pub mod optimize;
pub mod predictor;
pub mod preprocess;
pub mod prior;
pub mod projection;
pub mod render;
pub mod schedule;

pub use chroma::{lab_to_unit, unit_to_lab, ChromaPalette, ChromaScale, AB_NORM, PALETTE_BINS};
pub use color::{BilinearAdapter, ColorSpaceAdapter};
pub use config::{
    ColorizerConfig, ConfigError, DeviceConfig, GeometryConfig, LoggingConfig, LossConfig,
    PriorConfig, ScheduleConfig,
};
pub use context::{ColorizationContext, Device};
pub use decode::{argmax_bins, decode_expectation, decode_mode, validate_distribution};
pub use error::{ColorizeError, ColorizeResult, ShapeText};
pub use loss::{composite_loss, coupled_tv, mse_with_gradient, LossBreakdown};
pub use optimize::{ColorizationOutcome, IterationRecord, PriorOptimizer};
pub use predictor::{ColorPredictor, FrozenPredictor, SoftmaxPredictor, UniformPredictor};
pub use preprocess::{prepare, GrayscaleImage, PreparedImage};
pub use prior::{AdamOptimizer, ConvPrior, LanczosDownsampler, PriorNetwork};
pub use projection::{initial_target, project};
pub use render::{output_to_lab, render_baseline, render_refined, RgbImage};
pub use schedule::{Schedule, StepKind};
