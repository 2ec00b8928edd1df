//! Replay Buffer
//!
//! Experience replay buffer for off-policy Q-learning. Transitions are
//! stored in a fixed-capacity ring; minibatches are drawn uniformly at
//! random without replacement to decorrelate training data.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraderError};
use crate::rl::action::Action;

/// A single transition in the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// State features before action
    pub state: Vec<f64>,
    /// Action taken
    pub action: Action,
    /// Reward received
    pub reward: f64,
    /// Next state features
    pub next_state: Vec<f64>,
    /// Whether episode terminated
    pub done: bool,
}

impl Transition {
    /// Create a new transition
    pub fn new(state: Vec<f64>, action: Action, reward: f64, next_state: Vec<f64>, done: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// Replay buffer for experience storage
#[derive(Debug)]
pub struct ReplayBuffer {
    /// Storage for transitions
    buffer: VecDeque<Transition>,
    /// Maximum capacity
    capacity: usize,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a transition to the buffer, evicting the oldest entry when full
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Sample `batch_size` transitions uniformly without replacement
    ///
    /// Fails if the buffer holds fewer transitions than requested.
    pub fn sample(&self, batch_size: usize) -> Result<Vec<Transition>> {
        if self.buffer.len() < batch_size {
            return Err(TraderError::InsufficientSamples {
                available: self.buffer.len(),
                requested: batch_size,
            });
        }

        let mut rng = thread_rng();
        let mut indices: Vec<usize> = (0..self.buffer.len()).collect();
        indices.shuffle(&mut rng);

        Ok(indices
            .into_iter()
            .take(batch_size)
            .map(|i| self.buffer[i].clone())
            .collect())
    }

    /// Get current number of transitions
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer has enough samples for a batch
    pub fn can_sample(&self, batch_size: usize) -> bool {
        self.buffer.len() >= batch_size
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over stored transitions, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
