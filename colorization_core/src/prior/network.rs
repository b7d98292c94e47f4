//! Trainable generator used as the per-image deep prior.

use ndarray::{Array3, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::config::PriorConfig;
use crate::error::{ColorizeError, ColorizeResult};
use crate::prior::layer::Conv2d;
use crate::prior::optimizer::AdamOptimizer;

/// LAB channels produced by a prior network.
pub const OUTPUT_CHANNELS: usize = 3;

/// A generator optimized from scratch for one image.
///
/// Outputs are `[3, h, w]` in unit scale: channel 0 is L/100, channels 1 and
/// 2 are a*/b* mapped into [0, 1].
pub trait PriorNetwork {
    fn forward(&mut self, input: &Array3<f32>) -> ColorizeResult<Array3<f32>>;

    /// Accumulates parameter gradients for the last forward pass.
    fn backward(&mut self, grad_output: &Array3<f32>) -> ColorizeResult<()>;

    fn zero_grad(&mut self);

    fn apply_gradients(&mut self, optimizer: &mut AdamOptimizer);

    fn parameters_finite(&self) -> bool;

    fn parameter_count(&self) -> usize;

    fn output_channels(&self) -> usize {
        OUTPUT_CHANNELS
    }
}

/// Stack of 3×3 reflection-padded convolutions with LeakyReLU, followed by a
/// 1×1 projection to three channels and a sigmoid.
pub struct ConvPrior {
    blocks: Vec<Conv2d>,
    head: Conv2d,
    slope: f32,
    /// Pre-activation of each block from the last forward pass
    pre_activations: Vec<Array3<f32>>,
    /// Sigmoid output of the last forward pass
    output: Option<Array3<f32>>,
}

impl ConvPrior {
    pub fn new(config: &PriorConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut blocks = Vec::with_capacity(config.depth);
        let mut channels = config.input_channels;
        for idx in 0..config.depth {
            blocks.push(Conv2d::new(
                &format!("block{idx}"),
                channels,
                config.hidden_channels,
                3,
                &mut rng,
            ));
            channels = config.hidden_channels;
        }
        let head = Conv2d::new("head", channels, OUTPUT_CHANNELS, 1, &mut rng);

        Self {
            blocks,
            head,
            slope: config.leaky_slope,
            pre_activations: Vec::new(),
            output: None,
        }
    }

    pub fn input_channels(&self) -> usize {
        self.blocks
            .first()
            .map(Conv2d::in_channels)
            .unwrap_or_else(|| self.head.in_channels())
    }
}

impl PriorNetwork for ConvPrior {
    fn forward(&mut self, input: &Array3<f32>) -> ColorizeResult<Array3<f32>> {
        let (channels, rows, cols) = input.dim();
        if channels != self.input_channels() || rows < 2 || cols < 2 {
            return Err(ColorizeError::shape(
                "prior forward",
                format!("[{}, h >= 2, w >= 2]", self.input_channels()),
                input.dim(),
            ));
        }

        self.pre_activations.clear();
        let slope = self.slope;
        let mut activation = input.clone();
        for block in &mut self.blocks {
            let z = block.forward(&activation);
            activation = z.mapv(|v| if v > 0.0 { v } else { slope * v });
            self.pre_activations.push(z);
        }

        let logits = self.head.forward(&activation);
        let output = logits.mapv(|v| 1.0 / (1.0 + (-v).exp()));
        self.output = Some(output.clone());
        Ok(output)
    }

    fn backward(&mut self, grad_output: &Array3<f32>) -> ColorizeResult<()> {
        let output = self.output.as_ref().ok_or_else(|| {
            ColorizeError::shape("prior backward", "a preceding forward pass", "none")
        })?;
        if grad_output.dim() != output.dim() {
            return Err(ColorizeError::shape(
                "prior backward",
                output.dim(),
                grad_output.dim(),
            ));
        }

        let mut grad = Array3::zeros(output.dim());
        Zip::from(&mut grad)
            .and(grad_output)
            .and(output)
            .for_each(|g, &go, &y| *g = go * y * (1.0 - y));

        let needs_input = !self.blocks.is_empty();
        let mut grad = match self.head.backward(&grad, needs_input) {
            Some(grad) => grad,
            None => return Ok(()),
        };

        let slope = self.slope;
        for (idx, block) in self.blocks.iter_mut().enumerate().rev() {
            Zip::from(&mut grad)
                .and(&self.pre_activations[idx])
                .for_each(|g, &z| {
                    if z <= 0.0 {
                        *g *= slope;
                    }
                });
            if let Some(next) = block.backward(&grad, idx > 0) {
                grad = next;
            }
        }

        Ok(())
    }

    fn zero_grad(&mut self) {
        for block in &mut self.blocks {
            block.zero_grad();
        }
        self.head.zero_grad();
    }

    fn apply_gradients(&mut self, optimizer: &mut AdamOptimizer) {
        for block in &mut self.blocks {
            block.apply_gradients(optimizer);
        }
        self.head.apply_gradients(optimizer);
    }

    fn parameters_finite(&self) -> bool {
        self.blocks.iter().all(Conv2d::parameters_finite) && self.head.parameters_finite()
    }

    fn parameter_count(&self) -> usize {
        self.blocks.iter().map(Conv2d::parameter_count).sum::<usize>() + self.head.parameter_count()
    }
}

/// Frozen standard-normal input, `[input_channels, side, side]`, scaled by
/// `noise_std`.
pub fn noise_input(config: &PriorConfig, side: usize) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(0x5EED));
    Array3::from_shape_fn((config.input_channels, side, side), |_| {
        let sample: f32 = StandardNormal.sample(&mut rng);
        sample * config.noise_std
    })
}
