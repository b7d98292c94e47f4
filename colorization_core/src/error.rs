//! Error types for the colorization pipeline
//!
//! Every stage reports fatal conditions through [`ColorizeError`]. There is no
//! retry or partial-failure policy: any error aborts the run, so each variant
//! carries the stage name and the shapes or values needed for diagnosis.

use std::fmt;

use crate::config::ConfigError;

/// Result type alias for pipeline operations
pub type ColorizeResult<T> = Result<T, ColorizeError>;

/// Fatal conditions raised by the colorization stages
#[derive(Debug)]
pub enum ColorizeError {
    /// Wrong rank or dimensions entering a stage
    InputShape {
        stage: &'static str,
        expected: String,
        got: String,
    },

    /// Placement or numeric type mismatch across collaborators
    DeviceOrDType {
        stage: &'static str,
        details: String,
    },

    /// Non-finite values observed during optimization
    NumericInstability {
        stage: &'static str,
        iteration: Option<usize>,
        details: String,
    },

    /// The chrominance palette could not be built or loaded
    InvalidPalette { details: String },

    /// A predictor emitted something that is not a per-pixel distribution
    InvalidDistribution { details: String },

    /// Configuration could not be loaded
    Config(ConfigError),

    /// Underlying I/O failure (palette files, run logs, rendered output)
    Io(std::io::Error),
}

impl ColorizeError {
    /// Builds an [`ColorizeError::InputShape`] from shapes or descriptions.
    pub fn shape<E: ShapeText, G: ShapeText>(stage: &'static str, expected: E, got: G) -> Self {
        ColorizeError::InputShape {
            stage,
            expected: expected.shape_text(),
            got: got.shape_text(),
        }
    }

    pub fn unstable(stage: &'static str, iteration: Option<usize>, details: impl Into<String>) -> Self {
        ColorizeError::NumericInstability {
            stage,
            iteration,
            details: details.into(),
        }
    }
}

/// Renders an extent or a textual description inside shape errors.
///
/// Textual descriptions are printed as is; extents use their debug form.
pub trait ShapeText {
    fn shape_text(&self) -> String;
}

impl ShapeText for &str {
    fn shape_text(&self) -> String {
        (*self).to_string()
    }
}

impl ShapeText for String {
    fn shape_text(&self) -> String {
        self.clone()
    }
}

impl ShapeText for usize {
    fn shape_text(&self) -> String {
        self.to_string()
    }
}

impl ShapeText for &[usize] {
    fn shape_text(&self) -> String {
        format!("{:?}", self)
    }
}

impl ShapeText for (usize, usize) {
    fn shape_text(&self) -> String {
        format!("{:?}", self)
    }
}

impl ShapeText for (usize, usize, usize) {
    fn shape_text(&self) -> String {
        format!("{:?}", self)
    }
}

impl fmt::Display for ColorizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorizeError::InputShape {
                stage,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Input shape error in {}: expected {}, got {}",
                    stage, expected, got
                )
            }
            ColorizeError::DeviceOrDType { stage, details } => {
                write!(f, "Device or dtype mismatch in {}: {}", stage, details)
            }
            ColorizeError::NumericInstability {
                stage,
                iteration,
                details,
            } => match iteration {
                Some(iteration) => write!(
                    f,
                    "Numeric instability in {} at iteration {}: {}",
                    stage, iteration, details
                ),
                None => write!(f, "Numeric instability in {}: {}", stage, details),
            },
            ColorizeError::InvalidPalette { details } => {
                write!(f, "Invalid chrominance palette: {}", details)
            }
            ColorizeError::InvalidDistribution { details } => {
                write!(f, "Invalid probability distribution: {}", details)
            }
            ColorizeError::Config(err) => write!(f, "Configuration error: {}", err),
            ColorizeError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ColorizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ColorizeError::Config(err) => Some(err),
            ColorizeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for ColorizeError {
    fn from(err: ConfigError) -> Self {
        ColorizeError::Config(err)
    }
}

impl From<std::io::Error> for ColorizeError {
    fn from(err: std::io::Error) -> Self {
        ColorizeError::Io(err)
    }
}
