//! DQN Agent
//!
//! Epsilon-greedy action selection over an online Q-network, with an
//! experience replay buffer and a periodically synced target network for
//! stable bootstrapped TD targets.

use std::path::Path;

use rand::Rng;
use tracing::info;

use crate::error::Result;
use crate::rl::action::{Action, NUM_ACTIONS};
use crate::rl::config::AgentConfig;
use crate::rl::memory::{ReplayBuffer, Transition};
use crate::rl::network::QNetwork;

/// Deep Q-Network agent
pub struct DqnAgent {
    /// Online network, updated by gradient steps
    online: QNetwork,
    /// Target network, updated only by verbatim copy from the online one
    target: QNetwork,
    /// Experience replay buffer
    replay_buffer: ReplayBuffer,
    config: AgentConfig,
    /// Current exploration rate
    epsilon: f64,
    state_size: usize,
}

impl DqnAgent {
    /// Create a new agent for states of `state_size` prices
    pub fn new(state_size: usize, config: AgentConfig) -> Self {
        let online = QNetwork::new(
            state_size,
            &config.hidden_layers,
            NUM_ACTIONS,
            config.learning_rate,
        );
        let mut target = QNetwork::new(
            state_size,
            &config.hidden_layers,
            NUM_ACTIONS,
            config.learning_rate,
        );
        target.copy_from(&online);

        let replay_buffer = ReplayBuffer::new(config.buffer_size);
        let epsilon = config.epsilon_start;

        Self {
            online,
            target,
            replay_buffer,
            config,
            epsilon,
            state_size,
        }
    }

    /// Select an action with the epsilon-greedy policy
    pub fn act(&self, state: &[f64]) -> Result<Action> {
        let mut rng = rand::thread_rng();

        if rng.gen::<f64>() < self.epsilon {
            // Explore: uniformly random action
            let idx = rng.gen_range(0..NUM_ACTIONS);
            Action::try_from(idx)
        } else {
            self.act_greedy(state)
        }
    }

    /// Select the highest-valued action, ignoring epsilon
    ///
    /// Used for evaluation runs; ties resolve to the lowest action index
    /// so greedy rollouts are reproducible.
    pub fn act_greedy(&self, state: &[f64]) -> Result<Action> {
        let idx = self.online.best_action(state)?;
        Action::try_from(idx)
    }

    /// Store a transition in the replay buffer
    pub fn remember(&mut self, transition: Transition) {
        self.replay_buffer.push(transition);
    }

    /// Train the online network on a sampled minibatch
    ///
    /// Skips silently (no learning step, no epsilon decay) while the
    /// buffer holds fewer than `batch_size` transitions. Returns the mean
    /// squared TD error of the minibatch when training happened.
    pub fn replay(&mut self, batch_size: usize) -> Result<Option<f64>> {
        if !self.replay_buffer.can_sample(batch_size) {
            return Ok(None);
        }

        let minibatch = self.replay_buffer.sample(batch_size)?;
        let mut total_loss = 0.0;

        for transition in &minibatch {
            let target = if transition.done {
                transition.reward
            } else {
                let next_q = self.target.forward(&transition.next_state)?;
                let max_next_q = next_q.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                transition.reward + self.config.gamma * max_next_q
            };

            total_loss +=
                self.online
                    .fit_action(&transition.state, transition.action.index(), target)?;
        }

        self.decay_epsilon();

        Ok(Some(total_loss / minibatch.len() as f64))
    }

    /// Copy the online parameters into the target network (hard update)
    pub fn update_target_model(&mut self) {
        self.target.copy_from(&self.online);
    }

    /// Multiplicative epsilon decay, floored at the configured minimum
    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
    }

    /// Current exploration rate
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of transitions currently buffered
    pub fn buffer_len(&self) -> usize {
        self.replay_buffer.len()
    }

    /// Save the online network's weights
    ///
    /// The target network is not persisted; it is rebuilt from the online
    /// weights on load.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.online.save_file(&path)?;
        info!(path = %path.as_ref().display(), "saved model weights");
        Ok(())
    }

    /// Load online weights from a file and re-sync the target network
    ///
    /// On any failure the in-memory parameters are left untouched.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let network = QNetwork::load_file(&path)?;
        if network.input_dim != self.state_size || network.output_dim() != NUM_ACTIONS {
            return Err(crate::error::TraderError::Validation(format!(
                "loaded network shape {}x{} does not match agent shape {}x{}",
                network.input_dim,
                network.output_dim(),
                self.state_size,
                NUM_ACTIONS
            )));
        }

        self.online = network;
        self.target.copy_from(&self.online);
        info!(path = %path.as_ref().display(), "loaded model weights");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn networks(&self) -> (&QNetwork, &QNetwork) {
        (&self.online, &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AgentConfig {
        AgentConfig {
            buffer_size: 100,
            ..AgentConfig::default()
        }
    }

    fn fill_buffer(agent: &mut DqnAgent, n: usize) {
        for i in 0..n {
            let state = vec![i as f64 * 0.1; 10];
            let next_state = vec![(i + 1) as f64 * 0.1; 10];
            agent.remember(Transition::new(state, Action::Buy, 1.0, next_state, i == n - 1));
        }
    }

    #[test]
    fn test_act_returns_valid_action() {
        let agent = DqnAgent::new(10, test_config());
        let state = vec![0.5; 10];

        // Epsilon starts at 1.0, so this exercises the random branch
        let action = agent.act(&state).unwrap();
        assert!(action.index() < NUM_ACTIONS);

        let greedy = agent.act_greedy(&state).unwrap();
        assert!(greedy.index() < NUM_ACTIONS);
    }

    #[test]
    fn test_replay_skips_until_warm() {
        let mut agent = DqnAgent::new(10, test_config());
        fill_buffer(&mut agent, 5);

        let epsilon_before = agent.epsilon();
        let outcome = agent.replay(32).unwrap();

        assert!(outcome.is_none());
        assert_eq!(agent.epsilon(), epsilon_before);
    }

    #[test]
    fn test_replay_trains_and_decays_epsilon() {
        let mut agent = DqnAgent::new(10, test_config());
        fill_buffer(&mut agent, 40);

        let epsilon_before = agent.epsilon();
        let loss = agent.replay(32).unwrap();

        assert!(loss.is_some());
        assert!(agent.epsilon() < epsilon_before);
    }

    #[test]
    fn test_epsilon_monotone_and_floored() {
        let config = AgentConfig {
            epsilon_start: 0.05,
            epsilon_decay: 0.5,
            epsilon_min: 0.01,
            buffer_size: 100,
            ..AgentConfig::default()
        };
        let mut agent = DqnAgent::new(10, config);
        fill_buffer(&mut agent, 40);

        let mut previous = agent.epsilon();
        for _ in 0..10 {
            agent.replay(8).unwrap();
            assert!(agent.epsilon() <= previous);
            assert!(agent.epsilon() >= 0.01);
            previous = agent.epsilon();
        }
        assert_eq!(agent.epsilon(), 0.01);
    }

    #[test]
    fn test_target_sync_idempotent() {
        let mut agent = DqnAgent::new(10, test_config());
        fill_buffer(&mut agent, 40);
        agent.replay(32).unwrap();

        let state = vec![0.3; 10];

        agent.update_target_model();
        let first = agent.networks().1.forward(&state).unwrap();
        agent.update_target_model();
        let second = agent.networks().1.forward(&state).unwrap();

        assert_eq!(first, second);
        assert_eq!(agent.networks().0.forward(&state).unwrap(), second);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");

        let mut agent = DqnAgent::new(10, test_config());
        fill_buffer(&mut agent, 40);
        agent.replay(32).unwrap();
        agent.save(&path).unwrap();

        let mut restored = DqnAgent::new(10, test_config());
        restored.load(&path).unwrap();

        let state = vec![0.2; 10];
        let expected = agent.networks().0.forward(&state).unwrap();
        assert_eq!(restored.networks().0.forward(&state).unwrap(), expected);
        // Target re-syncs to the loaded weights
        assert_eq!(restored.networks().1.forward(&state).unwrap(), expected);
    }

    #[test]
    fn test_failed_load_preserves_weights() {
        let mut agent = DqnAgent::new(10, test_config());
        let state = vec![0.4; 10];
        let before = agent.networks().0.forward(&state).unwrap();

        assert!(agent.load("no/such/file.json").is_err());

        assert_eq!(agent.networks().0.forward(&state).unwrap(), before);
    }

    #[test]
    fn test_load_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");

        let other = DqnAgent::new(7, test_config());
        other.save(&path).unwrap();

        let mut agent = DqnAgent::new(10, test_config());
        assert!(agent.load(&path).is_err());
    }
}
