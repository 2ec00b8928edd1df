//! Q-Network
//!
//! Small trainable MLP for Q-value approximation (CPU-only).
//!
//! Design goals:
//! - Stable, deterministic, dependency-light.
//! - Explicit shape validation (fail fast, caller can fallback).
//!
//! Weights persist as JSON so a trained agent can be resumed or evaluated
//! without retraining.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
        }
    }

    /// Derivative with respect to the pre-activation input
    fn derivative(self, x: f64) -> f64 {
        match self {
            Activation::Linear => 1.0,
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights shape: [out_dim][in_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Xavier-uniform initialization, zero bias
    fn random(in_dim: usize, out_dim: usize, activation: Activation) -> Self {
        let mut rng = rand::thread_rng();
        let scale = (2.0 / (in_dim + out_dim) as f64).sqrt();

        let weights = (0..out_dim)
            .map(|_| (0..in_dim).map(|_| rng.gen_range(-scale..scale)).collect())
            .collect();

        Self {
            weights,
            bias: vec![0.0; out_dim],
            activation,
        }
    }

    fn in_dim(&self) -> usize {
        self.weights.first().map(|r| r.len()).unwrap_or(0)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }

    /// Pre-activations for a given input
    fn pre_activations(&self, input: &[f64]) -> Vec<f64> {
        let mut z = vec![0.0_f64; self.out_dim()];
        for (o, row) in self.weights.iter().enumerate() {
            let mut sum = self.bias[o];
            for (i, w) in row.iter().enumerate() {
                sum += w * input[i];
            }
            z[o] = sum;
        }
        z
    }
}

/// Q-value function approximator
///
/// Two independent copies of this network live on the agent: the online
/// network receives gradient steps, the target network is only ever
/// overwritten by a verbatim copy of the online parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QNetwork {
    /// Expected input dimension
    pub input_dim: usize,
    pub layers: Vec<DenseLayer>,
    /// Step size for gradient updates
    pub learning_rate: f64,
}

impl QNetwork {
    /// Create a randomly initialized network
    ///
    /// Hidden layers use ReLU; the output layer is linear so Q-values are
    /// unconstrained in sign and magnitude.
    pub fn new(input_dim: usize, hidden_layers: &[usize], output_dim: usize, learning_rate: f64) -> Self {
        let mut layers = Vec::with_capacity(hidden_layers.len() + 1);
        let mut in_dim = input_dim;

        for &width in hidden_layers {
            layers.push(DenseLayer::random(in_dim, width, Activation::Relu));
            in_dim = width;
        }
        layers.push(DenseLayer::random(in_dim, output_dim, Activation::Linear));

        Self {
            input_dim,
            layers,
            learning_rate,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_dim == 0 {
            return Err("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("layers must not be empty".to_string());
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err("learning_rate must be finite and > 0".to_string());
        }

        let mut expected_in = self.input_dim;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 {
                return Err(format!("layer[{idx}] out_dim must be > 0"));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.out_dim()
                ));
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != expected_in {
                    return Err(format!(
                        "layer[{idx}] weights row {r} len {} != expected in_dim {expected_in}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(format!("layer[{idx}] weights contain non-finite values"));
                }
            }
            if layer.bias.iter().any(|v| !v.is_finite()) {
                return Err(format!("layer[{idx}] bias contain non-finite values"));
            }
            expected_in = layer.out_dim();
        }
        Ok(())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.out_dim()).unwrap_or(0)
    }

    /// Predict Q-values for a single state
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.input_dim {
            return Err(TraderError::Validation(format!(
                "QNetwork input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut x: Vec<f64> = input.to_vec();
        for layer in &self.layers {
            x = layer
                .pre_activations(&x)
                .into_iter()
                .map(|z| layer.activation.apply(z))
                .collect();
        }
        Ok(x)
    }

    /// Index of the highest Q-value; ties resolve to the lowest index
    pub fn best_action(&self, input: &[f64]) -> Result<usize> {
        let q_values = self.forward(input)?;

        let mut best = 0;
        for (i, &q) in q_values.iter().enumerate().skip(1) {
            if q > q_values[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// One gradient step moving the Q-value of `action` toward `target`
    ///
    /// The remaining output coordinates keep their current predictions, so
    /// only the acted-on coordinate carries gradient signal. Returns the
    /// squared TD error before the update.
    pub fn fit_action(&mut self, state: &[f64], action: usize, target: f64) -> Result<f64> {
        if action >= self.output_dim() {
            return Err(TraderError::Validation(format!(
                "QNetwork action index {} out of range for output dim {}",
                action,
                self.output_dim()
            )));
        }
        if state.len() != self.input_dim {
            return Err(TraderError::Validation(format!(
                "QNetwork input dim mismatch: got {}, expected {}",
                state.len(),
                self.input_dim
            )));
        }

        // Forward pass, caching pre-activations and activations per layer
        let mut activations: Vec<Vec<f64>> = vec![state.to_vec()];
        let mut pre_activations: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let z = layer.pre_activations(&activations[activations.len() - 1]);
            let a = z.iter().map(|&v| layer.activation.apply(v)).collect();
            pre_activations.push(z);
            activations.push(a);
        }

        let output = &activations[activations.len() - 1];
        let error = output[action] - target;
        let loss = error * error;

        // Output delta: MSE gradient on the acted coordinate only
        let last = self.layers.len() - 1;
        let mut delta = vec![0.0_f64; self.layers[last].out_dim()];
        delta[action] = error * self.layers[last].activation.derivative(pre_activations[last][action]);

        // Backward pass with plain SGD updates
        for l in (0..self.layers.len()).rev() {
            let input = &activations[l];

            // Propagate through the pre-update weights before mutating them
            let prev_delta: Option<Vec<f64>> = if l > 0 {
                let layer = &self.layers[l];
                let prev_z = &pre_activations[l - 1];
                let prev_act = self.layers[l - 1].activation;
                let mut prev = vec![0.0_f64; layer.in_dim()];
                for (o, row) in layer.weights.iter().enumerate() {
                    if delta[o] == 0.0 {
                        continue;
                    }
                    for (i, w) in row.iter().enumerate() {
                        prev[i] += w * delta[o];
                    }
                }
                for (i, v) in prev.iter_mut().enumerate() {
                    *v *= prev_act.derivative(prev_z[i]);
                }
                Some(prev)
            } else {
                None
            };

            let lr = self.learning_rate;
            let layer = &mut self.layers[l];
            for (o, row) in layer.weights.iter_mut().enumerate() {
                if delta[o] == 0.0 {
                    continue;
                }
                for (i, w) in row.iter_mut().enumerate() {
                    *w -= lr * delta[o] * input[i];
                }
                layer.bias[o] -= lr * delta[o];
            }

            if let Some(prev) = prev_delta {
                delta = prev;
            }
        }

        Ok(loss)
    }

    /// Copy all parameters from another network (hard update)
    pub fn copy_from(&mut self, other: &QNetwork) {
        self.input_dim = other.input_dim;
        self.layers = other.layers.clone();
    }

    /// Save network weights to a JSON file
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TraderError::Persistence {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let file = File::create(path).map_err(|e| TraderError::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self).map_err(|e| TraderError::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load network weights from a JSON file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TraderError::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let reader = BufReader::new(file);
        let network: Self = serde_json::from_reader(reader).map_err(|e| TraderError::Persistence {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        network.validate().map_err(|reason| TraderError::Persistence {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(network)
    }
}
