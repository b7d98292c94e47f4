//! Per-image deep-prior refinement.
//!
//! A freshly initialized [`PriorNetwork`] is fitted to a fixed noise input so
//! that its downsampled output matches a palette-anchored target. Gradient
//! iterations alternate with re-projection iterations according to a
//! [`Schedule`]:
//!
//! ```text
//! j < warmup || j % every != 0   →  forward, composite loss, backward, Adam
//! otherwise                      →  target = project(downsample(latest output))
//! ```

use std::path::Path;

use ndarray::Array3;
use serde::Serialize;

use crate::context::ColorizationContext;
use crate::error::{ColorizeError, ColorizeResult};
use crate::logging::{self, IterationLogEntry, RunSummaryEntry};
use crate::loss::{composite_loss, LossBreakdown};
use crate::preprocess::PreparedImage;
use crate::prior::{noise_input, AdamOptimizer, ConvPrior, LanczosDownsampler, PriorNetwork, OUTPUT_CHANNELS};
use crate::projection::{initial_target, project};
use crate::schedule::{Schedule, StepKind};

/// One entry of the optimization trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub step: StepKind,
    /// Loss evaluated before the update; `None` on re-projection iterations
    pub loss: Option<LossBreakdown>,
}

/// Terminal result of one optimization run.
#[derive(Debug, Clone)]
pub struct ColorizationOutcome {
    /// Latest `[3, high, high]` network output in unit scale
    pub output: Array3<f32>,
    /// Fidelity target in force at the end of the run, `[3, low, low]`
    pub target: Array3<f32>,
    pub trace: Vec<IterationRecord>,
    pub reprojections: Vec<usize>,
}

impl ColorizationOutcome {
    pub fn iterations(&self) -> usize {
        self.trace.len()
    }

    /// Total loss of the last gradient iteration.
    pub fn final_loss(&self) -> Option<f32> {
        self.trace
            .iter()
            .rev()
            .find_map(|record| record.loss.map(|loss| loss.total))
    }
}

/// Mutable state of a run; dropped once the outcome is assembled.
struct OptimizationState {
    output: Option<Array3<f32>>,
    target: Array3<f32>,
    iteration: usize,
}

/// Owns the prior network, its frozen noise input and the downsampler for
/// one image.
pub struct PriorOptimizer<'a, N = ConvPrior> {
    ctx: &'a ColorizationContext,
    prepared: &'a PreparedImage,
    network: N,
    noise: Array3<f32>,
    downsampler: LanczosDownsampler,
    schedule: Schedule,
}

impl<'a> PriorOptimizer<'a, ConvPrior> {
    /// Builds the default [`ConvPrior`] from the context's prior settings.
    pub fn new(ctx: &'a ColorizationContext, prepared: &'a PreparedImage) -> ColorizeResult<Self> {
        let network = ConvPrior::new(&ctx.config().prior);
        Self::with_network(ctx, prepared, network)
    }
}

impl<'a, N: PriorNetwork> PriorOptimizer<'a, N> {
    /// Uses an injected network. Its input is the configured
    /// `[input_channels, high_res, high_res]` noise.
    pub fn with_network(
        ctx: &'a ColorizationContext,
        prepared: &'a PreparedImage,
        network: N,
    ) -> ColorizeResult<Self> {
        let config = ctx.config();
        let geometry = config.geometry;
        let high = (geometry.high_res, geometry.high_res);
        let low = (geometry.low_res, geometry.low_res);

        if prepared.luminance_high().dim() != high {
            return Err(ColorizeError::shape(
                "prior optimizer",
                high,
                prepared.luminance_high().dim(),
            ));
        }
        if prepared.luminance_low().dim() != low {
            return Err(ColorizeError::shape(
                "prior optimizer",
                low,
                prepared.luminance_low().dim(),
            ));
        }
        if network.output_channels() != OUTPUT_CHANNELS {
            return Err(ColorizeError::shape(
                "prior optimizer",
                format!("{OUTPUT_CHANNELS} output channels"),
                network.output_channels(),
            ));
        }

        Ok(Self {
            ctx,
            prepared,
            network,
            noise: noise_input(&config.prior, geometry.high_res),
            downsampler: LanczosDownsampler::new(geometry.factor()),
            schedule: Schedule::from(&config.schedule),
        })
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Runs the configured iteration count and learning rate.
    pub fn run(self) -> ColorizeResult<ColorizationOutcome> {
        let schedule = self.ctx.config().schedule;
        self.run_with(schedule.num_iter, schedule.learning_rate)
    }

    pub fn run_with(mut self, num_iter: usize, learning_rate: f32) -> ColorizeResult<ColorizationOutcome> {
        let ctx = self.ctx;
        let log_every = ctx.config().logging.log_every;
        let run_log = ctx.config().logging.run_log.clone();

        let mut adam = AdamOptimizer::new(learning_rate);
        let mut state = OptimizationState {
            output: None,
            target: initial_target(
                self.prepared.distribution().view(),
                ctx.palette(),
                self.prepared.luminance_low().view(),
            )?,
            iteration: 0,
        };
        let mut trace = Vec::with_capacity(num_iter);
        let mut reprojections = Vec::new();

        tracing::info!(
            num_iter,
            learning_rate,
            parameters = self.network.parameter_count(),
            planned_reprojections = ?self.schedule.reprojections(num_iter),
            "starting prior optimization"
        );

        for j in 0..num_iter {
            state.iteration = j;
            let record = match self.schedule.step_kind(j) {
                StepKind::Gradient => {
                    let loss = self.gradient_step(&mut state, &mut adam)?;
                    if j % log_every == 0 {
                        tracing::debug!(
                            iteration = j,
                            loss = loss.total,
                            fidelity = loss.fidelity,
                            luminance = loss.luminance,
                            coupled_tv = loss.coupled_tv,
                            "gradient step"
                        );
                    }
                    IterationRecord {
                        iteration: j,
                        step: StepKind::Gradient,
                        loss: Some(loss),
                    }
                }
                StepKind::Reproject => {
                    self.reproject(&mut state)?;
                    reprojections.push(j);
                    tracing::info!(iteration = j, "re-projected fidelity target onto palette");
                    IterationRecord {
                        iteration: j,
                        step: StepKind::Reproject,
                        loss: None,
                    }
                }
            };

            if let Some(path) = run_log.as_ref() {
                append_record(path, &record);
            }
            trace.push(record);
        }

        let output = match state.output.take() {
            Some(output) => output,
            None => self.forward(state.iteration)?,
        };

        let outcome = ColorizationOutcome {
            output,
            target: state.target,
            trace,
            reprojections,
        };

        tracing::info!(
            iterations = outcome.iterations(),
            final_loss = ?outcome.final_loss(),
            reprojections = ?outcome.reprojections,
            "prior optimization finished"
        );
        if let Some(path) = run_log.as_ref() {
            let summary = RunSummaryEntry {
                iterations: outcome.iterations(),
                reprojections: outcome.reprojections.clone(),
                final_loss: outcome.final_loss(),
                timestamp_ms: logging::timestamp_ms(),
            };
            if let Err(err) = logging::log_run_summary(path, &summary) {
                tracing::warn!(path = %path.display(), "failed to write run summary: {err}");
            }
        }

        Ok(outcome)
    }

    fn forward(&mut self, iteration: usize) -> ColorizeResult<Array3<f32>> {
        let output = self.network.forward(&self.noise)?;
        let high = self.ctx.config().geometry.high_res;
        if output.dim() != (OUTPUT_CHANNELS, high, high) {
            return Err(ColorizeError::shape(
                "prior forward",
                (OUTPUT_CHANNELS, high, high),
                output.dim(),
            ));
        }
        if output.iter().any(|v| !v.is_finite()) {
            return Err(ColorizeError::unstable(
                "prior forward",
                Some(iteration),
                "network output contains non-finite values",
            ));
        }
        Ok(output)
    }

    fn gradient_step(
        &mut self,
        state: &mut OptimizationState,
        adam: &mut AdamOptimizer,
    ) -> ColorizeResult<LossBreakdown> {
        let iteration = state.iteration;
        let output = self.forward(iteration)?;
        let (loss, grad) = composite_loss(
            output.view(),
            state.target.view(),
            self.prepared.luminance_high().view(),
            &self.downsampler,
            &self.ctx.config().loss,
        )?;
        if !loss.is_finite() {
            return Err(ColorizeError::unstable(
                "composite loss",
                Some(iteration),
                format!("loss is not finite: {loss:?}"),
            ));
        }

        self.network.zero_grad();
        self.network.backward(&grad)?;
        adam.begin_step();
        self.network.apply_gradients(adam);
        if !self.network.parameters_finite() {
            return Err(ColorizeError::unstable(
                "adam update",
                Some(iteration),
                "network parameters became non-finite",
            ));
        }

        state.output = Some(output);
        Ok(loss)
    }

    /// The latest output is the one produced by the most recent forward pass,
    /// i.e. before the parameter update of that iteration.
    fn reproject(&mut self, state: &mut OptimizationState) -> ColorizeResult<()> {
        let latest = match state.output.take() {
            Some(output) => output,
            None => self.forward(state.iteration)?,
        };
        let downsampled = self.downsampler.forward(latest.view())?;
        state.target = project(
            downsampled.view(),
            self.ctx.palette(),
            self.prepared.luminance_low().view(),
        )?;
        state.output = Some(latest);
        Ok(())
    }
}

fn append_record(path: &Path, record: &IterationRecord) {
    let entry = IterationLogEntry::new(record.iteration, record.step, record.loss.as_ref());
    if let Err(err) = logging::log_iteration(path, &entry) {
        tracing::warn!(path = %path.display(), "failed to append iteration record: {err}");
    }
}
