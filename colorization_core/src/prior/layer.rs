//! Convolution layer with reflection padding and a hand-written backward pass.

use ndarray::{s, Array1, Array3, Array4, Zip};
use rand::rngs::StdRng;
use rand::Rng;

use crate::prior::optimizer::AdamOptimizer;

/// Source index for position `i` of an axis reflection-padded by `pad`.
fn reflect(i: usize, pad: usize, n: usize) -> usize {
    let src = i as isize - pad as isize;
    let last = n as isize - 1;
    let idx = if src < 0 {
        -src
    } else if src > last {
        2 * last - src
    } else {
        src
    };
    idx as usize
}

fn reflect_map(n: usize, pad: usize) -> Vec<usize> {
    (0..n + 2 * pad).map(|i| reflect(i, pad, n)).collect()
}

/// Reflection padding of every channel of `[c, h, w]`.
pub fn reflect_pad(input: &Array3<f32>, pad: usize) -> Array3<f32> {
    if pad == 0 {
        return input.clone();
    }
    let (channels, rows, cols) = input.dim();
    let row_map = reflect_map(rows, pad);
    let col_map = reflect_map(cols, pad);
    Array3::from_shape_fn((channels, rows + 2 * pad, cols + 2 * pad), |(c, r, k)| {
        input[[c, row_map[r], col_map[k]]]
    })
}

/// Adjoint of [`reflect_pad`]: folds a padded gradient back onto `(rows, cols)`.
pub fn reflect_pad_adjoint(grad: &Array3<f32>, pad: usize, rows: usize, cols: usize) -> Array3<f32> {
    if pad == 0 {
        return grad.clone();
    }
    let channels = grad.dim().0;
    let row_map = reflect_map(rows, pad);
    let col_map = reflect_map(cols, pad);
    let mut out = Array3::zeros((channels, rows, cols));
    for ((c, r, k), &g) in grad.indexed_iter() {
        out[[c, row_map[r], col_map[k]]] += g;
    }
    out
}

/// Square-kernel 2-D convolution, stride 1, "same" output size.
///
/// ```text
/// out[o] = bias[o] + Σ_c Σ_(ky,kx) weight[o, c, ky, kx] · pad(input)[c, y + ky, x + kx]
/// ```
#[derive(Debug, Clone)]
pub struct Conv2d {
    name: String,
    kernel: usize,
    pub weight: Array4<f32>,
    pub bias: Array1<f32>,
    grad_weight: Array4<f32>,
    grad_bias: Array1<f32>,
    /// Padded input of the last forward pass
    cached_input: Option<Array3<f32>>,
}

impl Conv2d {
    /// Uniform initialization in ±1/√fan_in for weights and bias.
    ///
    /// # Panics
    ///
    /// Panics if `kernel` is even.
    pub fn new(name: &str, in_channels: usize, out_channels: usize, kernel: usize, rng: &mut StdRng) -> Self {
        assert!(kernel % 2 == 1, "kernel size must be odd");
        let fan_in = (in_channels * kernel * kernel) as f32;
        let bound = 1.0 / fan_in.sqrt();
        let weight = Array4::from_shape_fn((out_channels, in_channels, kernel, kernel), |_| {
            (rng.gen::<f32>() - 0.5) * 2.0 * bound
        });
        let bias = Array1::from_shape_fn(out_channels, |_| (rng.gen::<f32>() - 0.5) * 2.0 * bound);

        Self {
            name: name.to_string(),
            kernel,
            grad_weight: Array4::zeros(weight.dim()),
            grad_bias: Array1::zeros(bias.dim()),
            weight,
            bias,
            cached_input: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dim().0
    }

    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    pub fn grad_weight(&self) -> &Array4<f32> {
        &self.grad_weight
    }

    pub fn grad_bias(&self) -> &Array1<f32> {
        &self.grad_bias
    }

    fn pad(&self) -> usize {
        self.kernel / 2
    }

    pub fn forward(&mut self, input: &Array3<f32>) -> Array3<f32> {
        let (channels, rows, cols) = input.dim();
        assert_eq!(channels, self.in_channels(), "{}: input channel mismatch", self.name);

        let padded = reflect_pad(input, self.pad());
        let mut out = Array3::zeros((self.out_channels(), rows, cols));

        for (o, mut plane) in out.outer_iter_mut().enumerate() {
            plane.fill(self.bias[o]);
            for c in 0..channels {
                for ky in 0..self.kernel {
                    for kx in 0..self.kernel {
                        let window = padded.slice(s![c, ky..ky + rows, kx..kx + cols]);
                        plane.scaled_add(self.weight[[o, c, ky, kx]], &window);
                    }
                }
            }
        }

        self.cached_input = Some(padded);
        out
    }

    /// Accumulates parameter gradients from `grad_output` and, when
    /// `input_grad` is set, returns the gradient with respect to the input.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Conv2d::forward`].
    pub fn backward(&mut self, grad_output: &Array3<f32>, input_grad: bool) -> Option<Array3<f32>> {
        let padded = self
            .cached_input
            .as_ref()
            .expect("forward must run before backward");
        let (_, rows, cols) = grad_output.dim();
        let channels = self.in_channels();
        let mut grad_padded = input_grad.then(|| Array3::<f32>::zeros(padded.dim()));

        for (o, g) in grad_output.outer_iter().enumerate() {
            self.grad_bias[o] += g.sum();
            for c in 0..channels {
                for ky in 0..self.kernel {
                    for kx in 0..self.kernel {
                        let window = padded.slice(s![c, ky..ky + rows, kx..kx + cols]);
                        self.grad_weight[[o, c, ky, kx]] +=
                            Zip::from(&g).and(&window).fold(0.0, |acc, &a, &b| acc + a * b);

                        if let Some(grad_padded) = grad_padded.as_mut() {
                            grad_padded
                                .slice_mut(s![c, ky..ky + rows, kx..kx + cols])
                                .scaled_add(self.weight[[o, c, ky, kx]], &g);
                        }
                    }
                }
            }
        }

        grad_padded.map(|grad| reflect_pad_adjoint(&grad, self.pad(), rows, cols))
    }

    pub fn zero_grad(&mut self) {
        self.grad_weight.fill(0.0);
        self.grad_bias.fill(0.0);
    }

    pub fn apply_gradients(&mut self, optimizer: &mut AdamOptimizer) {
        optimizer.update(&format!("{}.weight", self.name), &mut self.weight, &self.grad_weight);
        optimizer.update(&format!("{}.bias", self.name), &mut self.bias, &self.grad_bias);
    }

    pub fn parameters_finite(&self) -> bool {
        self.weight.iter().chain(self.bias.iter()).all(|v| v.is_finite())
    }
}
