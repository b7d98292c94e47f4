//! Iteration schedule of the refinement loop.

use serde::Serialize;

use crate::config::ScheduleConfig;

/// What a single iteration does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Forward, loss, backward and one Adam update
    Gradient,
    /// Replace the fidelity target by the palette projection of the latest
    /// output; parameters are left untouched
    Reproject,
}

/// Gradient steps everywhere except at multiples of `every` from `warmup` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub warmup: usize,
    pub every: usize,
}

impl Schedule {
    /// # Panics
    ///
    /// Panics if `every` is zero.
    pub fn new(warmup: usize, every: usize) -> Self {
        assert!(every > 0, "re-projection period must be positive");
        Self { warmup, every }
    }

    pub fn step_kind(&self, iteration: usize) -> StepKind {
        if iteration < self.warmup || iteration % self.every != 0 {
            StepKind::Gradient
        } else {
            StepKind::Reproject
        }
    }

    /// Re-projection iterations in `[0, num_iter)`, ascending.
    pub fn reprojections(&self, num_iter: usize) -> Vec<usize> {
        let first = self.warmup.div_ceil(self.every) * self.every;
        (first..num_iter).step_by(self.every).collect()
    }
}

impl From<&ScheduleConfig> for Schedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self::new(config.warmup, config.reproject_every)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}
