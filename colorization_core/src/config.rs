//! Colorizer configuration management via TOML files.
//!
//! Every section is optional; missing keys fall back to the standard settings
//! (256/64 geometry, 313 bins, re-projection every 200 iterations after a
//! warmup of 800).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Full configuration for one colorization run.
///
/// # Examples
///
/// ```
/// use colorization_core::ColorizerConfig;
///
/// let config = ColorizerConfig::from_str("[schedule]\nnum_iter = 1201")
///     .unwrap_or_else(|_| ColorizerConfig::default());
///
/// assert_eq!(config.schedule.num_iter, 1201);
/// assert_eq!(config.geometry.high_res, 256);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ColorizerConfig {
    pub geometry: GeometryConfig,
    pub schedule: ScheduleConfig,
    pub loss: LossConfig,
    pub prior: PriorConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

impl ColorizerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawColorizerConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        Ok(Self {
            geometry: GeometryConfig::try_from(&raw.geometry)?,
            schedule: ScheduleConfig::try_from(&raw.schedule)?,
            loss: LossConfig::try_from(&raw.loss)?,
            prior: PriorConfig::try_from(&raw.prior)?,
            device: DeviceConfig::try_from(&raw.device)?,
            logging: LoggingConfig::try_from(&raw.logging)?,
        })
    }

    /// Re-runs the file-loading checks on a configuration built in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry.validate()?;
        self.schedule.validate()?;
        self.loss.validate()?;
        self.prior.validate()?;
        self.device.validate()?;
        self.logging.validate()
    }
}

impl Default for ColorizerConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            schedule: ScheduleConfig::default(),
            loss: LossConfig::default(),
            prior: PriorConfig::default(),
            device: DeviceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Working resolutions and palette size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeometryConfig {
    /// Side of the predictor input and the prior network output
    pub high_res: usize,
    /// Side of the predictor output and the fidelity target
    pub low_res: usize,
    /// Number of chrominance bins in the palette
    pub bins: usize,
}

impl GeometryConfig {
    /// Ratio between the two working resolutions.
    pub fn factor(&self) -> usize {
        self.high_res / self.low_res
    }

    fn try_from(raw: &RawGeometry) -> Result<Self, ConfigError> {
        let geometry = Self {
            high_res: raw.high_res,
            low_res: raw.low_res,
            bins: raw.bins,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.low_res < 2 {
            return Err(ConfigError::Parse("geometry.low_res must be ≥ 2".into()));
        }
        if self.high_res < self.low_res || self.high_res % self.low_res != 0 {
            return Err(ConfigError::Parse(
                "geometry.high_res must be an integer multiple of geometry.low_res".into(),
            ));
        }
        if self.bins == 0 {
            return Err(ConfigError::Parse("geometry.bins must be ≥ 1".into()));
        }
        Ok(())
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            high_res: default_high_res(),
            low_res: default_low_res(),
            bins: default_bins(),
        }
    }
}

/// Iteration count and re-projection cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduleConfig {
    pub num_iter: usize,
    pub learning_rate: f32,
    /// First iteration at which a re-projection may replace a gradient step
    pub warmup: usize,
    /// Re-projection period once past the warmup
    pub reproject_every: usize,
}

impl ScheduleConfig {
    fn try_from(raw: &RawSchedule) -> Result<Self, ConfigError> {
        let schedule = Self {
            num_iter: raw.num_iter,
            learning_rate: raw.learning_rate,
            warmup: raw.warmup,
            reproject_every: raw.reproject_every,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::Parse(
                "schedule.learning_rate must be positive".into(),
            ));
        }
        if self.reproject_every == 0 {
            return Err(ConfigError::Parse(
                "schedule.reproject_every must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            num_iter: default_num_iter(),
            learning_rate: default_learning_rate(),
            warmup: default_warmup(),
            reproject_every: default_reproject_every(),
        }
    }
}

/// Weights of the composite loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossConfig {
    /// Scale applied to squared luminance differences inside the coupled TV
    pub gamma: f32,
    pub epsilon: f32,
    pub tv_weight: f32,
}

impl LossConfig {
    fn try_from(raw: &RawLoss) -> Result<Self, ConfigError> {
        let loss = Self {
            gamma: raw.gamma,
            epsilon: raw.epsilon,
            tv_weight: raw.tv_weight,
        };
        loss.validate()?;
        Ok(loss)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(ConfigError::Parse("loss.gamma must be ≥ 0".into()));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::Parse("loss.epsilon must be positive".into()));
        }
        if !self.tv_weight.is_finite() || self.tv_weight < 0.0 {
            return Err(ConfigError::Parse("loss.tv_weight must be ≥ 0".into()));
        }
        Ok(())
    }
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            epsilon: default_epsilon(),
            tv_weight: default_tv_weight(),
        }
    }
}

/// Shape and initialization of the default prior network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorConfig {
    pub input_channels: usize,
    pub hidden_channels: usize,
    /// Number of 3×3 convolution blocks before the output projection
    pub depth: usize,
    pub seed: u64,
    pub noise_std: f32,
    pub leaky_slope: f32,
}

impl PriorConfig {
    fn try_from(raw: &RawPrior) -> Result<Self, ConfigError> {
        let prior = Self {
            input_channels: raw.input_channels,
            hidden_channels: raw.hidden_channels,
            depth: raw.depth,
            seed: raw.seed,
            noise_std: raw.noise_std,
            leaky_slope: raw.leaky_slope,
        };
        prior.validate()?;
        Ok(prior)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.input_channels == 0 || self.hidden_channels == 0 {
            return Err(ConfigError::Parse(
                "prior.input_channels and prior.hidden_channels must be ≥ 1".into(),
            ));
        }
        if self.depth == 0 {
            return Err(ConfigError::Parse("prior.depth must be ≥ 1".into()));
        }
        if !self.noise_std.is_finite() || self.noise_std <= 0.0 {
            return Err(ConfigError::Parse("prior.noise_std must be positive".into()));
        }
        if !self.leaky_slope.is_finite() || !(0.0..1.0).contains(&self.leaky_slope) {
            return Err(ConfigError::Parse(
                "prior.leaky_slope must lie in [0, 1)".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            input_channels: default_input_channels(),
            hidden_channels: default_hidden_channels(),
            depth: default_depth(),
            seed: default_seed(),
            noise_std: default_noise_std(),
            leaky_slope: default_leaky_slope(),
        }
    }
}

/// Explicit compute placement, threaded through context construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceConfig {
    /// Target device ("cpu"; other backends are rejected at context build)
    pub kind: String,
    /// Numeric precision ("f32")
    pub precision: String,
}

impl DeviceConfig {
    fn try_from(raw: &RawDevice) -> Result<Self, ConfigError> {
        let device = Self {
            kind: raw.kind.trim().to_lowercase(),
            precision: raw.precision.trim().to_lowercase(),
        };
        device.validate()?;
        Ok(device)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.kind.trim().is_empty() {
            return Err(ConfigError::Parse("device.kind must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: default_device_kind(),
            precision: default_precision(),
        }
    }
}

/// Run trace and progress reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    /// JSON-lines file receiving one record per iteration
    pub run_log: Option<PathBuf>,
    /// Progress event cadence in iterations
    pub log_every: usize,
}

impl LoggingConfig {
    fn try_from(raw: &RawLogging) -> Result<Self, ConfigError> {
        let logging = Self {
            run_log: raw.run_log.clone(),
            log_every: raw.log_every,
        };
        logging.validate()?;
        Ok(logging)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.log_every == 0 {
            return Err(ConfigError::Parse("logging.log_every must be ≥ 1".into()));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            run_log: None,
            log_every: default_log_every(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawColorizerConfig {
    #[serde(default)]
    geometry: RawGeometry,
    #[serde(default)]
    schedule: RawSchedule,
    #[serde(default)]
    loss: RawLoss,
    #[serde(default)]
    prior: RawPrior,
    #[serde(default)]
    device: RawDevice,
    #[serde(default)]
    logging: RawLogging,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(default = "default_high_res")]
    high_res: usize,
    #[serde(default = "default_low_res")]
    low_res: usize,
    #[serde(default = "default_bins")]
    bins: usize,
}

impl Default for RawGeometry {
    fn default() -> Self {
        Self {
            high_res: default_high_res(),
            low_res: default_low_res(),
            bins: default_bins(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(default = "default_num_iter")]
    num_iter: usize,
    #[serde(default = "default_learning_rate")]
    learning_rate: f32,
    #[serde(default = "default_warmup")]
    warmup: usize,
    #[serde(default = "default_reproject_every")]
    reproject_every: usize,
}

impl Default for RawSchedule {
    fn default() -> Self {
        Self {
            num_iter: default_num_iter(),
            learning_rate: default_learning_rate(),
            warmup: default_warmup(),
            reproject_every: default_reproject_every(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLoss {
    #[serde(default = "default_gamma")]
    gamma: f32,
    #[serde(default = "default_epsilon")]
    epsilon: f32,
    #[serde(default = "default_tv_weight")]
    tv_weight: f32,
}

impl Default for RawLoss {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            epsilon: default_epsilon(),
            tv_weight: default_tv_weight(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPrior {
    #[serde(default = "default_input_channels")]
    input_channels: usize,
    #[serde(default = "default_hidden_channels")]
    hidden_channels: usize,
    #[serde(default = "default_depth")]
    depth: usize,
    #[serde(default = "default_seed")]
    seed: u64,
    #[serde(default = "default_noise_std")]
    noise_std: f32,
    #[serde(default = "default_leaky_slope")]
    leaky_slope: f32,
}

impl Default for RawPrior {
    fn default() -> Self {
        Self {
            input_channels: default_input_channels(),
            hidden_channels: default_hidden_channels(),
            depth: default_depth(),
            seed: default_seed(),
            noise_std: default_noise_std(),
            leaky_slope: default_leaky_slope(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    #[serde(default = "default_device_kind")]
    kind: String,
    #[serde(default = "default_precision")]
    precision: String,
}

impl Default for RawDevice {
    fn default() -> Self {
        Self {
            kind: default_device_kind(),
            precision: default_precision(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLogging {
    #[serde(default)]
    run_log: Option<PathBuf>,
    #[serde(default = "default_log_every")]
    log_every: usize,
}

impl Default for RawLogging {
    fn default() -> Self {
        Self {
            run_log: None,
            log_every: default_log_every(),
        }
    }
}

fn default_high_res() -> usize {
    256
}

fn default_low_res() -> usize {
    64
}

fn default_bins() -> usize {
    313
}

fn default_num_iter() -> usize {
    1000
}

fn default_learning_rate() -> f32 {
    0.01
}

fn default_warmup() -> usize {
    800
}

fn default_reproject_every() -> usize {
    200
}

fn default_gamma() -> f32 {
    100.0
}

fn default_epsilon() -> f32 {
    1e-5
}

fn default_tv_weight() -> f32 {
    5e-6
}

fn default_input_channels() -> usize {
    32
}

fn default_hidden_channels() -> usize {
    16
}

fn default_depth() -> usize {
    2
}

fn default_seed() -> u64 {
    42
}

fn default_noise_std() -> f32 {
    1.0
}

fn default_leaky_slope() -> f32 {
    0.2
}

fn default_device_kind() -> String {
    "cpu".to_string()
}

fn default_precision() -> String {
    "f32".to_string()
}

fn default_log_every() -> usize {
    50
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ColorizerConfig::from_str("").unwrap();
        assert_eq!(config.geometry, GeometryConfig::default());
        assert_eq!(config.geometry.factor(), 4);
        assert_eq!(config.schedule.warmup, 800);
        assert_eq!(config.schedule.reproject_every, 200);
        assert_eq!(config.prior.input_channels, 32);
        assert_eq!(config.device.kind, "cpu");
        assert!(config.logging.run_log.is_none());
    }

    #[test]
    fn parses_custom_sections() {
        let toml = r#"
[geometry]
high_res = 32
low_res = 8

[schedule]
num_iter = 1201
learning_rate = 0.005

[loss]
gamma = 50.0
tv_weight = 1e-4

[prior]
hidden_channels = 4
seed = 7

[logging]
run_log = "logs/run.jsonl"
log_every = 10
"#;
        let config = ColorizerConfig::from_str(toml).unwrap();
        assert_eq!(config.geometry.high_res, 32);
        assert_eq!(config.geometry.factor(), 4);
        assert_eq!(config.geometry.bins, 313);
        assert_eq!(config.schedule.num_iter, 1201);
        assert!((config.schedule.learning_rate - 0.005).abs() < f32::EPSILON);
        assert!((config.loss.gamma - 50.0).abs() < f32::EPSILON);
        assert!((config.loss.epsilon - 1e-5).abs() < f32::EPSILON);
        assert_eq!(config.prior.hidden_channels, 4);
        assert_eq!(config.prior.seed, 7);
        assert_eq!(
            config.logging.run_log.as_deref(),
            Some(Path::new("logs/run.jsonl"))
        );
        assert_eq!(config.logging.log_every, 10);
    }

    #[test]
    fn rejects_non_integer_resolution_ratio() {
        let toml = "[geometry]\nhigh_res = 100\nlow_res = 64";
        assert!(ColorizerConfig::from_str(toml).is_err());
    }

    #[test]
    fn rejects_zero_reprojection_period() {
        let toml = "[schedule]\nreproject_every = 0";
        assert!(ColorizerConfig::from_str(toml).is_err());
    }

    #[test]
    fn validate_catches_values_set_in_code() {
        let mut config = ColorizerConfig::default();
        assert!(config.validate().is_ok());

        config.prior.leaky_slope = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_non_positive_learning_rate() {
        let toml = "[schedule]\nlearning_rate = 0.0";
        assert!(ColorizerConfig::from_str(toml).is_err());
    }
}
