//! Environment orchestrator.
//!
//! [`NasimEnv`] validates each action against the network (reachability,
//! firewall, probability gate), delegates execution to the [`Network`],
//! patches the shared [`State`], propagates reachability and detects the
//! goal. The check order in [`NasimEnv::step`] is fixed and short-circuits on
//! the first failure.

use crate::action::{Action, ActionSpace};
use crate::error::EnvError;
use crate::network::{ActionOutcome, Network};
use crate::render::{EpisodeStep, RenderMode, Viewer};
use crate::scenario::{
    generate_scenario, load_scenario, Address, GeneratorParams, Scenario, ScenarioError, ServiceId,
    INTERNET_SUBNET,
};
use crate::state::State;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How much of the true network state the agent sees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservabilityMode {
    /// Fully observable: the returned state is the true simulation state
    #[default]
    Mdp,
    /// Partially observable. Not implemented.
    Pomdp,
}

impl ObservabilityMode {
    pub const ALL: [ObservabilityMode; 2] = [ObservabilityMode::Mdp, ObservabilityMode::Pomdp];

    pub fn name(self) -> &'static str {
        match self {
            ObservabilityMode::Mdp => "MDP",
            ObservabilityMode::Pomdp => "POMDP",
        }
    }
}

impl fmt::Display for ObservabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObservabilityMode {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                EnvError::InvalidConfig(format!(
                    "unknown observability mode '{}', expected one of: MDP, POMDP",
                    s
                ))
            })
    }
}

/// Argument to [`NasimEnv::step`]: an action-space index or an action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionChoice {
    Index(usize),
    Action(Action),
}

impl From<usize> for ActionChoice {
    fn from(index: usize) -> Self {
        ActionChoice::Index(index)
    }
}

impl From<Action> for ActionChoice {
    fn from(action: Action) -> Self {
        ActionChoice::Action(action)
    }
}

impl From<&Action> for ActionChoice {
    fn from(action: &Action) -> Self {
        ActionChoice::Action(action.clone())
    }
}

/// Auxiliary step information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub success: bool,
    /// Service presence revealed by the action
    pub services: BTreeMap<ServiceId, bool>,
    /// OS name revealed by the action
    pub os: Option<String>,
}

/// Result of one step. `state` is the environment's live state, not a copy.
#[derive(Debug)]
pub struct Step<'a> {
    pub state: &'a State,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Why a well-formed action did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Unreachable,
    Blocked,
    Unlucky,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Unreachable => write!(f, "target unreachable"),
            Rejection::Blocked => write!(f, "traffic blocked by firewall"),
            Rejection::Unlucky => write!(f, "probabilistic failure"),
        }
    }
}

/// Simulated network environment for a single agent
pub struct NasimEnv<R = StdRng> {
    scenario: Scenario,
    network: Network,
    action_space: ActionSpace,
    state: State,
    compromised_subnets: BTreeSet<usize>,
    done: bool,
    rng: R,
}

impl NasimEnv<StdRng> {
    /// Environment with an entropy-seeded random source
    pub fn new(scenario: Scenario, mode: ObservabilityMode) -> Result<Self, EnvError> {
        Self::with_rng(scenario, mode, StdRng::from_entropy())
    }

    pub fn seeded(
        scenario: Scenario,
        mode: ObservabilityMode,
        seed: u64,
    ) -> Result<Self, EnvError> {
        Self::with_rng(scenario, mode, StdRng::seed_from_u64(seed))
    }

    /// Environment for a scenario file
    pub fn from_file(path: &Path, mode: ObservabilityMode) -> Result<Self, EnvError> {
        let scenario = load_scenario(path)?;
        Self::new(scenario, mode)
    }

    /// Environment for a generated network. The generator seed also seeds the
    /// environment's random source.
    pub fn from_params(
        num_hosts: usize,
        num_services: usize,
        params: &GeneratorParams,
        mode: ObservabilityMode,
    ) -> Result<Self, EnvError> {
        let scenario = generate_scenario(num_hosts, num_services, params).map_err(|e| match e {
            ScenarioError::InvalidParams(msg) => EnvError::InvalidConfig(msg),
            other => EnvError::Scenario(other),
        })?;
        Self::seeded(scenario, mode, params.seed)
    }
}

impl<R: Rng> NasimEnv<R> {
    /// Environment drawing action outcomes from `rng`
    pub fn with_rng(scenario: Scenario, mode: ObservabilityMode, rng: R) -> Result<Self, EnvError> {
        scenario.validate()?;
        let network = Network::new(&scenario);
        let action_space = ActionSpace::from_scenario(&scenario);
        let state = Self::generate_initial_state(mode, &network)?;

        let mut env = Self {
            scenario,
            network,
            action_space,
            state,
            compromised_subnets: BTreeSet::new(),
            done: false,
            rng,
        };
        env.reset();
        info!("Created {} ({} mode, {} actions)", env, mode, env.action_space.len());
        Ok(env)
    }

    /// Initial state: nothing compromised, only internet-adjacent subnets
    /// reachable, no service information
    fn generate_initial_state(
        mode: ObservabilityMode,
        network: &Network,
    ) -> Result<State, EnvError> {
        match mode {
            ObservabilityMode::Mdp => Ok(State::from_network(network)),
            ObservabilityMode::Pomdp => {
                Err(EnvError::Unimplemented("partially observable (POMDP) mode"))
            }
        }
    }

    /// Start a new episode. Returns the live state, re-encoded in place.
    pub fn reset(&mut self) -> &State {
        self.compromised_subnets = BTreeSet::from([INTERNET_SUBNET]);
        self.network.reset();
        self.state.refresh(&self.network);
        self.done = self.is_goal();
        debug!(
            "Environment reset: {} hosts reachable, goal {}",
            self.network.reachable_set().len(),
            if self.done { "already reached" } else { "pending" }
        );
        &self.state
    }

    /// Run one step.
    ///
    /// Only an out-of-range index is an error. Unreachable targets, blocked
    /// traffic and failed probability draws charge the action cost and leave
    /// everything unchanged. Once the goal holds, further steps are no-ops
    /// with reward 0 until [`reset`](Self::reset).
    pub fn step(&mut self, action: impl Into<ActionChoice>) -> Result<Step<'_>, EnvError> {
        let action = self.resolve_action(action.into())?;

        if self.done {
            debug!("Goal already reached, ignoring {}", action);
            return Ok(Step {
                state: &self.state,
                reward: 0.0,
                done: true,
                info: StepInfo::default(),
            });
        }

        if let Err(rejection) = self.check_action(&action) {
            debug!("{} rejected: {}", action, rejection);
            return Ok(Step {
                state: &self.state,
                reward: -action.cost,
                done: false,
                info: StepInfo::default(),
            });
        }

        let outcome = self.network.perform_action(&action);
        self.update_state(&action, &outcome);
        self.done = self.is_goal();

        let reward = outcome.value - action.cost;
        debug!("{} -> success={}, reward={}", action, outcome.success, reward);
        let os = outcome
            .os
            .and_then(|os| self.network.os_name(os))
            .map(str::to_string);
        Ok(Step {
            state: &self.state,
            reward,
            done: self.done,
            info: StepInfo {
                success: outcome.success,
                services: outcome.services,
                os,
            },
        })
    }

    fn resolve_action(&self, choice: ActionChoice) -> Result<Action, EnvError> {
        match choice {
            ActionChoice::Action(action) => Ok(action),
            ActionChoice::Index(index) => self
                .action_space
                .get(index)
                .cloned()
                .ok_or(EnvError::InvalidAction {
                    index,
                    size: self.action_space.len(),
                }),
        }
    }

    /// Reachability, then firewall, then the probability gate
    fn check_action(&mut self, action: &Action) -> Result<(), Rejection> {
        if !self.network.reachable(action.target) {
            return Err(Rejection::Unreachable);
        }
        if !self.action_traffic_permitted(action) {
            return Err(Rejection::Blocked);
        }
        if !self.probability_gate(action) {
            return Err(Rejection::Unlucky);
        }
        Ok(())
    }

    /// Scans work around the firewall. Exploits need some compromised subnet
    /// (the internet included) allowed to send the service to the target.
    fn action_traffic_permitted(&self, action: &Action) -> bool {
        if action.is_scan() {
            return true;
        }
        let Some(service) = action.service else {
            return false;
        };
        let dst = action.target.subnet;
        self.compromised_subnets
            .iter()
            .any(|&src| self.network.traffic_permitted(src, dst, service))
    }

    /// Passes unless a uniform draw in [0, 1) exceeds the success probability
    fn probability_gate(&mut self, action: &Action) -> bool {
        let draw: f64 = self.rng.gen();
        draw <= action.prob
    }

    fn update_state(&mut self, action: &Action, outcome: &ActionOutcome) {
        if !outcome.success {
            return;
        }
        if action.is_exploit() {
            self.compromised_subnets.insert(action.target.subnet);
            for addr in self.update_reachable(action.target) {
                self.state.update(&self.network, addr);
            }
        }
        self.state.update(&self.network, action.target);
    }

    /// One-shot frontier expansion: every host in a subnet connected to the
    /// newly compromised host's subnet becomes reachable. Returns the newly
    /// reachable addresses.
    fn update_reachable(&mut self, compromised: Address) -> Vec<Address> {
        let src = compromised.subnet;
        let newly_reachable: Vec<Address> = self
            .network
            .address_space()
            .iter()
            .copied()
            .filter(|&addr| {
                !self.network.reachable(addr) && self.network.subnets_connected(src, addr.subnet)
            })
            .collect();
        for &addr in &newly_reachable {
            self.network.set_reachable(addr);
        }
        newly_reachable
    }

    /// True iff every sensitive host is compromised
    pub fn is_goal(&self) -> bool {
        self.network
            .sensitive_hosts()
            .into_iter()
            .all(|addr| self.network.compromised(addr))
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Live state, the same instance returned by `step` and `reset`
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    pub fn compromised_subnets(&self) -> &BTreeSet<usize> {
        &self.compromised_subnets
    }

    pub fn state_size(&self) -> usize {
        self.state.size()
    }

    pub fn state_shape(&self) -> (usize, usize) {
        self.state.shape()
    }

    pub fn num_actions(&self) -> usize {
        self.action_space.len()
    }

    /// Fewest exploits that compromise every sensitive host from the initial
    /// state
    pub fn minimum_actions(&self) -> usize {
        self.network.minimal_steps()
    }

    /// Analytic upper bound on the episode return assuming unit action cost:
    /// total sensitive value minus the minimal number of steps
    pub fn best_possible_score(&self) -> f64 {
        self.network.total_sensitive_host_value() - self.network.minimal_steps() as f64
    }

    /// `<subnet sizes>_<number of services>_`
    pub fn outfile_name(&self) -> String {
        format!("{:?}_{}_", self.network.subnets(), self.scenario.num_services())
    }

    pub fn render(&self, mode: RenderMode) -> String {
        Viewer::new(&self.network).render(&self.state, mode)
    }

    pub fn render_episode(&self, episode: &[EpisodeStep]) -> String {
        Viewer::new(&self.network).render_episode(episode)
    }

    pub fn render_network_graph(&self) -> String {
        Viewer::new(&self.network).render_network_graph(&self.state)
    }
}

impl<R> fmt::Display for NasimEnv<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Environment: Subnets = {:?}, Services = {}, ",
            self.network.subnets(),
            self.scenario.num_services()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::parse_scenario;

    const DMZ_ONLY: &str = r#"
subnets: [1]
topology:
  - [1, 1]
  - [1, 1]
services: [ssh]
exploits:
  ssh: { cost: 1.0, prob: 1.0 }
scan_cost: 0.0
firewall:
  - { src: 0, dst: 1, services: [ssh] }
hosts:
  - { address: [1, 0], services: [ssh], value: 10, sensitive: true }
"#;

    fn env() -> NasimEnv {
        NasimEnv::seeded(parse_scenario(DMZ_ONLY).unwrap(), ObservabilityMode::Mdp, 0).unwrap()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("MDP".parse::<ObservabilityMode>().unwrap(), ObservabilityMode::Mdp);
        assert_eq!("pomdp".parse::<ObservabilityMode>().unwrap(), ObservabilityMode::Pomdp);
        assert!(matches!("HMM".parse::<ObservabilityMode>(), Err(EnvError::InvalidConfig(_))));
    }

    #[test]
    fn test_pomdp_unimplemented() {
        let scenario = parse_scenario(DMZ_ONLY).unwrap();
        let result = NasimEnv::seeded(scenario, ObservabilityMode::Pomdp, 0);
        assert!(matches!(result, Err(EnvError::Unimplemented(_))));
    }

    #[test]
    fn test_invalid_index() {
        let mut env = env();
        let size = env.num_actions();
        assert!(matches!(
            env.step(size),
            Err(EnvError::InvalidAction { index, size: s }) if index == size && s == size
        ));
    }

    #[test]
    fn test_step_after_goal_is_noop() {
        let mut env = env();
        let exploit = Action::exploit(Address::new(1, 0), 0, 1.0, 1.0);
        assert!(env.step(&exploit).unwrap().done);

        let step = env.step(&exploit).unwrap();
        assert!(step.done);
        assert_eq!(step.reward, 0.0);
        assert!(!step.info.success);

        env.reset();
        assert!(!env.is_done());
        assert!(!env.state().compromised(Address::new(1, 0)));
    }

    #[test]
    fn test_summary_and_outfile_name() {
        let env = env();
        assert_eq!(env.to_string(), "Environment: Subnets = [1], Services = 1, ");
        assert_eq!(env.outfile_name(), "[1]_1_");
    }

    #[test]
    fn test_reset_returns_live_state() {
        let mut env = env();
        let shape = env.reset().shape();
        assert_eq!(shape, (1, 3));
        assert_eq!(env.compromised_subnets(), &BTreeSet::from([INTERNET_SUBNET]));
    }
}
