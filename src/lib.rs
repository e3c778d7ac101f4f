//! # NASim - Network Attack Simulator
//!
//! This library simulates a computer network as an environment for training
//! and evaluating autonomous agents that perform penetration-testing style
//! attacks.
//!
//! ## Overview
//!
//! A network is built from a scenario: subnets of hosts, each host with an
//! operating system, running services, vulnerabilities, a value and a
//! sensitive flag. Subnets are linked by a connectivity graph and guarded by
//! firewall rules that decide which services may travel between them. An agent
//! repeatedly submits an action (scan or exploit) against a target host and
//! receives an observation, a reward, a termination flag and auxiliary info.
//!
//! ## Architecture
//!
//! - `scenario`: scenario types, YAML loading and procedural generation
//! - `action`: actions and the fixed, indexable action space
//! - `network`: hosts, subnet graph, firewall, action execution
//! - `state`: fixed-shape feature encoding of what the agent knows
//! - `environment`: the step/reset orchestrator and goal detection
//! - `render`: ascii, readable and GraphViz renderings
//! - `runner`: parallel random-agent evaluation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nasim::environment::{NasimEnv, ObservabilityMode};
//! use std::path::Path;
//!
//! let mut env = NasimEnv::from_file(Path::new("tiny.yaml"), ObservabilityMode::Mdp)?;
//! let step = env.step(0usize)?;
//! println!("reward={} done={}", step.reward, step.done);
//!
//! // The returned state is live; copy it to keep history
//! let history = vec![env.state().snapshot()];
//! # let _ = history;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Scenario Format
//!
//! ```yaml
//! subnets: [1, 2]            # hosts per subnet, the internet is subnet 0
//! topology:                  # adjacency over internet + subnets
//!   - [1, 1, 0]
//!   - [1, 1, 1]
//!   - [0, 1, 1]
//! services: [ssh, http]
//! os: [linux, windows]
//! exploits:
//!   http: { cost: 1.0, prob: 0.8 }
//! scan_cost: 1.0
//! firewall:
//!   - { src: 0, dst: 1, services: [http] }
//! hosts:
//!   - { address: [1, 0], os: linux, services: [http] }
//!   - { address: [2, 0], os: windows, services: [ssh], value: 10, sensitive: true }
//! ```
//!
//! ## Error Handling
//!
//! Malformed requests (bad configuration, out-of-range action index,
//! unimplemented observability mode) are [`error::EnvError`] values. Legal
//! actions that fail inside the simulation are never errors: they charge the
//! action cost and the episode continues.

pub mod action;
pub mod environment;
pub mod error;
pub mod network;
pub mod render;
pub mod runner;
pub mod scenario;
pub mod state;

pub use action::{Action, ActionKind, ActionSpace};
pub use environment::{ActionChoice, NasimEnv, ObservabilityMode, Step, StepInfo};
pub use error::EnvError;
pub use scenario::{Address, Scenario, INTERNET};
pub use state::State;
