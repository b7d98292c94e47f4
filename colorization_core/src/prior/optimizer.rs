//! Adam optimizer for prior network parameters.

use std::collections::HashMap;

use ndarray::{Array, ArrayD, Dimension, IxDyn, Zip};

/// Adam optimizer (Adaptive Moment Estimation).
///
/// Moments are tracked per named parameter. One call to
/// [`AdamOptimizer::begin_step`] advances the shared time step; every
/// parameter updated afterwards uses the same bias correction.
pub struct AdamOptimizer {
    /// Learning rate
    pub learning_rate: f32,
    /// Exponential decay rate for first moment (typically 0.9)
    pub beta1: f32,
    /// Exponential decay rate for second moment (typically 0.999)
    pub beta2: f32,
    /// Small constant for numerical stability
    pub epsilon: f32,
    /// First moment estimates (mean of gradients)
    first_moments: HashMap<String, ArrayD<f32>>,
    /// Second moment estimates (uncentered variance of gradients)
    second_moments: HashMap<String, ArrayD<f32>>,
    /// Time step counter
    t: usize,
}

impl AdamOptimizer {
    /// Creates a new Adam optimizer with the usual β and ε defaults.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            first_moments: HashMap::new(),
            second_moments: HashMap::new(),
            t: 0,
        }
    }

    pub fn time_step(&self) -> usize {
        self.t
    }

    /// Advances the time step; call once per optimization iteration.
    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    /// Updates a parameter in place from its gradient.
    ///
    /// # Panics
    ///
    /// Panics if `param` and `gradient` shapes differ, or if
    /// [`AdamOptimizer::begin_step`] was never called.
    pub fn update<D: Dimension>(
        &mut self,
        param_name: &str,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
    ) {
        assert_eq!(param.shape(), gradient.shape(), "gradient shape mismatch for {param_name}");
        assert!(self.t > 0, "begin_step must precede update");

        let shape = IxDyn(param.shape());
        let m = self
            .first_moments
            .entry(param_name.to_string())
            .or_insert_with(|| ArrayD::zeros(shape.clone()));
        let v = self
            .second_moments
            .entry(param_name.to_string())
            .or_insert_with(|| ArrayD::zeros(shape));

        let (beta1, beta2) = (self.beta1, self.beta2);
        let bias1 = 1.0 - beta1.powi(self.t as i32);
        let bias2 = 1.0 - beta2.powi(self.t as i32);
        let (lr, eps) = (self.learning_rate, self.epsilon);

        let mut param = param.view_mut().into_dyn();
        let gradient = gradient.view().into_dyn();

        Zip::from(&mut param)
            .and(m)
            .and(v)
            .and(&gradient)
            .for_each(|p, m, v, &g| {
                // m = beta1 * m + (1 - beta1) * g
                *m = beta1 * *m + (1.0 - beta1) * g;
                // v = beta2 * v + (1 - beta2) * g^2
                *v = beta2 * *v + (1.0 - beta2) * g * g;

                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }

    /// Resets all accumulated moments.
    pub fn reset(&mut self) {
        self.first_moments.clear();
        self.second_moments.clear();
        self.t = 0;
    }
}
