//! Immutable dependencies shared by every pipeline stage.

use std::sync::Arc;

use crate::chroma::ChromaPalette;
use crate::color::{BilinearAdapter, ColorSpaceAdapter};
use crate::config::ColorizerConfig;
use crate::error::{ColorizeError, ColorizeResult};
use crate::predictor::{ColorPredictor, FrozenPredictor};

/// Compute placement resolved from [`crate::config::DeviceConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
}

/// Configuration, palette, predictor and adapter for a process.
///
/// Built once and passed by reference into preprocessing and optimization.
/// Nothing in the crate mutates it after construction.
#[derive(Clone)]
pub struct ColorizationContext {
    config: ColorizerConfig,
    device: Device,
    palette: ChromaPalette,
    predictor: Arc<dyn ColorPredictor>,
    adapter: Arc<dyn ColorSpaceAdapter>,
}

impl ColorizationContext {
    /// Builds a context with the default [`BilinearAdapter`].
    ///
    /// The configuration is validated first, so fields set in code are held
    /// to the same rules as a loaded file. The predictor is wrapped in a [`FrozenPredictor`] checking the
    /// configured geometry.
    pub fn new<P>(config: ColorizerConfig, palette: ChromaPalette, predictor: P) -> ColorizeResult<Self>
    where
        P: ColorPredictor + 'static,
    {
        Self::with_adapter(config, palette, predictor, Arc::new(BilinearAdapter))
    }

    pub fn with_adapter<P>(
        config: ColorizerConfig,
        palette: ChromaPalette,
        predictor: P,
        adapter: Arc<dyn ColorSpaceAdapter>,
    ) -> ColorizeResult<Self>
    where
        P: ColorPredictor + 'static,
    {
        config.validate()?;
        let device = resolve_device(&config)?;

        if palette.len() != config.geometry.bins {
            return Err(ColorizeError::InvalidPalette {
                details: format!(
                    "palette has {} entries but geometry.bins = {}",
                    palette.len(),
                    config.geometry.bins
                ),
            });
        }

        let predictor = FrozenPredictor::new(predictor, config.geometry);

        Ok(Self {
            config,
            device,
            palette,
            predictor: Arc::new(predictor),
            adapter,
        })
    }

    pub fn config(&self) -> &ColorizerConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn palette(&self) -> &ChromaPalette {
        &self.palette
    }

    pub fn predictor(&self) -> &dyn ColorPredictor {
        self.predictor.as_ref()
    }

    pub fn adapter(&self) -> &dyn ColorSpaceAdapter {
        self.adapter.as_ref()
    }
}

fn resolve_device(config: &ColorizerConfig) -> ColorizeResult<Device> {
    let device = match config.device.kind.as_str() {
        "cpu" => Device::Cpu,
        other => {
            return Err(ColorizeError::DeviceOrDType {
                stage: "context",
                details: format!("unsupported device '{other}', only 'cpu' is available"),
            })
        }
    };

    if config.device.precision != "f32" {
        return Err(ColorizeError::DeviceOrDType {
            stage: "context",
            details: format!(
                "unsupported precision '{}', only 'f32' is available",
                config.device.precision
            ),
        });
    }

    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chroma::tests::lattice_palette;
    use crate::predictor::UniformPredictor;

    #[test]
    fn rejects_unknown_device() {
        let mut config = ColorizerConfig::default();
        config.device.kind = "cuda".into();
        let predictor = UniformPredictor::new(&config.geometry);
        let result = ColorizationContext::new(config, lattice_palette(), predictor);
        assert!(matches!(result, Err(ColorizeError::DeviceOrDType { .. })));
    }

    #[test]
    fn rejects_half_precision() {
        let mut config = ColorizerConfig::default();
        config.device.precision = "f16".into();
        let predictor = UniformPredictor::new(&config.geometry);
        assert!(ColorizationContext::new(config, lattice_palette(), predictor).is_err());
    }

    fn assert_config_rejected(config: ColorizerConfig) {
        let predictor = UniformPredictor::new(&config.geometry);
        let result = ColorizationContext::new(config, lattice_palette(), predictor);
        assert!(matches!(result, Err(ColorizeError::Config(_))));
    }

    #[test]
    fn rejects_zero_log_cadence_set_in_code() {
        let mut config = ColorizerConfig::default();
        config.logging.log_every = 0;
        assert_config_rejected(config);
    }

    #[test]
    fn rejects_zero_reprojection_period_set_in_code() {
        let mut config = ColorizerConfig::default();
        config.schedule.reproject_every = 0;
        assert_config_rejected(config);
    }

    #[test]
    fn rejects_zero_low_resolution_set_in_code() {
        let mut config = ColorizerConfig::default();
        config.geometry.low_res = 0;
        assert_config_rejected(config);
    }

    #[test]
    fn rejects_palette_bin_mismatch() {
        let mut config = ColorizerConfig::default();
        config.geometry.bins = 10;
        let predictor = UniformPredictor::new(&config.geometry);
        let result = ColorizationContext::new(config, lattice_palette(), predictor);
        assert!(matches!(result, Err(ColorizeError::InvalidPalette { .. })));
    }

    #[test]
    fn clones_share_palette_and_predictor() {
        let config = ColorizerConfig::default();
        let predictor = UniformPredictor::new(&config.geometry);
        let ctx = ColorizationContext::new(config, lattice_palette(), predictor).unwrap();
        let clone = ctx.clone();
        assert_eq!(clone.device(), Device::Cpu);
        assert!(std::ptr::eq(
            ctx.palette().entries().as_ptr(),
            clone.palette().entries().as_ptr()
        ));
    }
}
