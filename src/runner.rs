//! Random-agent evaluation harness.
//!
//! Every episode runs in its own environment instance with its own seeded
//! random sources, so episodes can run in parallel on the rayon pool without
//! sharing any state.

use crate::environment::{NasimEnv, ObservabilityMode};
use crate::error::EnvError;
use crate::scenario::Scenario;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub episodes: usize,
    /// Step limit per episode
    pub max_steps: usize,
    pub seed: u64,
    pub mode: ObservabilityMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_steps: 1000,
            seed: 0,
            mode: ObservabilityMode::Mdp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f64,
    pub goal_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub environment: String,
    pub best_possible_score: f64,
    pub minimal_steps: usize,
    pub mean_reward: f64,
    /// Fraction of episodes that reached the goal
    pub goal_rate: f64,
    pub episodes: Vec<EpisodeSummary>,
}

/// Run `config.episodes` episodes of a uniform random policy
pub fn run_random_agent(scenario: &Scenario, config: &RunConfig) -> Result<RunReport, EnvError> {
    // Fails early on an unsupported mode or invalid scenario
    let reference = NasimEnv::seeded(scenario.clone(), config.mode, config.seed)?;

    log::info!(
        "Running {} random-agent episodes (max {} steps each)",
        config.episodes,
        config.max_steps
    );

    let episodes = (0..config.episodes)
        .into_par_iter()
        .map(|episode| run_episode(scenario, config, episode))
        .collect::<Result<Vec<_>, EnvError>>()?;

    let count = episodes.len().max(1) as f64;
    let mean_reward = episodes.iter().map(|e| e.total_reward).sum::<f64>() / count;
    let goal_rate = episodes.iter().filter(|e| e.goal_reached).count() as f64 / count;

    Ok(RunReport {
        environment: reference.to_string(),
        best_possible_score: reference.best_possible_score(),
        minimal_steps: reference.minimum_actions(),
        mean_reward,
        goal_rate,
        episodes,
    })
}

fn run_episode(
    scenario: &Scenario,
    config: &RunConfig,
    episode: usize,
) -> Result<EpisodeSummary, EnvError> {
    let base = config.seed.wrapping_add(2 * episode as u64);
    let mut env = NasimEnv::seeded(scenario.clone(), config.mode, base)?;
    let mut policy = StdRng::seed_from_u64(base.wrapping_add(1));

    let mut total_reward = 0.0;
    let mut steps = 0;
    let mut goal_reached = env.is_done();
    let num_actions = env.num_actions();

    while !goal_reached && steps < config.max_steps && num_actions > 0 {
        let action = policy.gen_range(0..num_actions);
        let step = env.step(action)?;
        total_reward += step.reward;
        goal_reached = step.done;
        steps += 1;
    }

    log::debug!(
        "Episode {}: {} steps, reward {:.2}, goal {}",
        episode,
        steps,
        total_reward,
        goal_reached
    );
    Ok(EpisodeSummary {
        episode,
        steps,
        total_reward,
        goal_reached,
    })
}
