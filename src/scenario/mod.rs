//! Network scenarios.
//!
//! This module defines the scenario description consumed by the environment,
//! and the two ways of obtaining one: loading a YAML file or generating a
//! network procedurally.

pub mod types;
pub mod loader;
pub mod generator;

// Re-export key types and functions for easier access
pub use types::{
    Address, ExploitConfig, HostConfig, OsId, Scenario, ScenarioError, ServiceId, ServiceState,
    INTERNET, INTERNET_SUBNET,
};
pub use loader::{load_generator_params, load_scenario, parse_scenario};
pub use generator::{generate_scenario, GeneratorParams, MIN_HOSTS, MIN_SERVICES};
