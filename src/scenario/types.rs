//! Scenario type definitions.
//!
//! A scenario is the finished, validated description of a network: subnet
//! sizes, the subnet adjacency matrix, firewall policy, per-host services and
//! vulnerabilities, and the exploits an attacker may attempt.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Subnet id reserved for the internet pseudo-subnet.
pub const INTERNET_SUBNET: usize = 0;

/// The attacker's entry point. Never a real host.
pub const INTERNET: Address = Address::INTERNET;

/// Index of a service in [`Scenario::services`].
pub type ServiceId = usize;

/// Index of an operating system in [`Scenario::os`].
pub type OsId = usize;

/// Location of a host as a `(subnet, host)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Address {
    pub subnet: usize,
    pub host: usize,
}

impl Address {
    pub const INTERNET: Address = Address { subnet: INTERNET_SUBNET, host: 0 };

    pub const fn new(subnet: usize, host: usize) -> Self {
        Self { subnet, host }
    }

    /// Returns true if this is the internet pseudo-address. Other
    /// addresses in subnet 0 are not.
    pub fn is_internet(&self) -> bool {
        *self == Address::INTERNET
    }
}

impl From<(usize, usize)> for Address {
    fn from((subnet, host): (usize, usize)) -> Self {
        Self { subnet, host }
    }
}

impl From<Address> for (usize, usize) {
    fn from(addr: Address) -> Self {
        (addr.subnet, addr.host)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.subnet, self.host)
    }
}

/// What the attacker knows about a service on a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Present,
    Absent,
    Unknown,
}

impl ServiceState {
    pub fn from_presence(present: bool) -> Self {
        if present {
            ServiceState::Present
        } else {
            ServiceState::Absent
        }
    }

    /// Feature value used in the state encoding. Unobserved encodes as 0.
    pub fn encode(self) -> f64 {
        match self {
            ServiceState::Present => 1.0,
            ServiceState::Absent => -1.0,
            ServiceState::Unknown => 0.0,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            ServiceState::Present => '+',
            ServiceState::Absent => '-',
            ServiceState::Unknown => '?',
        }
    }
}

/// Cost and success probability of exploiting one service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExploitConfig {
    pub cost: f64,
    pub prob: f64,
}

/// Static description of a single host
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub address: Address,
    pub os: Option<OsId>,
    /// Running services, indexed by [`ServiceId`]
    pub services: Vec<bool>,
    /// Exploitable services, indexed by [`ServiceId`]. Subset of `services`.
    pub vulnerabilities: Vec<bool>,
    /// Reward for the first compromise of this host
    pub value: f64,
    pub sensitive: bool,
}

/// A finished network scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Host count of each real subnet; subnet `i + 1` has `subnets[i]` hosts
    pub subnets: Vec<usize>,
    /// Adjacency over the internet (row 0) and every real subnet
    pub topology: Vec<Vec<bool>>,
    pub services: Vec<String>,
    pub os: Vec<String>,
    pub hosts: Vec<HostConfig>,
    /// `(src, dst)` subnet pair to permitted services
    pub firewall: BTreeMap<(usize, usize), BTreeSet<ServiceId>>,
    pub exploits: BTreeMap<ServiceId, ExploitConfig>,
    pub scan_cost: f64,
}

impl Scenario {
    /// Every valid host address, ordered by subnet then host id
    pub fn address_space(&self) -> Vec<Address> {
        self.subnets
            .iter()
            .enumerate()
            .flat_map(|(i, &size)| (0..size).map(move |h| Address::new(i + 1, h)))
            .collect()
    }

    pub fn num_services(&self) -> usize {
        self.services.len()
    }

    pub fn num_os(&self) -> usize {
        self.os.len()
    }

    pub fn num_hosts(&self) -> usize {
        self.subnets.iter().sum()
    }

    /// Number of subnets including the internet
    pub fn num_subnets(&self) -> usize {
        self.subnets.len() + 1
    }

    pub fn sensitive_addresses(&self) -> Vec<Address> {
        self.hosts
            .iter()
            .filter(|h| h.sensitive)
            .map(|h| h.address)
            .collect()
    }

    pub fn host(&self, addr: Address) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.address == addr)
    }

    /// Check the structural consistency of the scenario
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let num_subnets = self.num_subnets();
        let num_services = self.num_services();

        if self.subnets.iter().any(|&size| size == 0) {
            return Err(ScenarioError::Invalid(
                "subnets must contain at least one host".to_string(),
            ));
        }

        if self.topology.len() != num_subnets
            || self.topology.iter().any(|row| row.len() != num_subnets)
        {
            return Err(ScenarioError::Invalid(format!(
                "topology must be a {n}x{n} matrix (internet + {} subnets)",
                self.subnets.len(),
                n = num_subnets
            )));
        }

        if !is_valid_cost(self.scan_cost) {
            return Err(ScenarioError::Invalid(format!("invalid scan cost {}", self.scan_cost)));
        }

        for (&service, exploit) in &self.exploits {
            if service >= num_services {
                return Err(ScenarioError::Invalid(format!(
                    "exploit for unknown service id {}",
                    service
                )));
            }
            if !is_valid_cost(exploit.cost) {
                return Err(ScenarioError::Invalid(format!(
                    "exploit for '{}' has invalid cost {}",
                    self.services[service], exploit.cost
                )));
            }
            if !(0.0..=1.0).contains(&exploit.prob) {
                return Err(ScenarioError::Invalid(format!(
                    "exploit for '{}' has probability {} outside [0, 1]",
                    self.services[service], exploit.prob
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for host in &self.hosts {
            let addr = host.address;
            let in_range = addr.subnet >= 1
                && addr.subnet <= self.subnets.len()
                && addr.host < self.subnets[addr.subnet - 1];
            if !in_range {
                return Err(ScenarioError::Invalid(format!(
                    "host address {} is outside the declared subnets",
                    addr
                )));
            }
            if !seen.insert(addr) {
                return Err(ScenarioError::Invalid(format!("duplicate host address {}", addr)));
            }
            if host.services.len() != num_services || host.vulnerabilities.len() != num_services {
                return Err(ScenarioError::Invalid(format!(
                    "host {} must describe exactly {} services",
                    addr, num_services
                )));
            }
            let vulnerable_but_idle = host
                .vulnerabilities
                .iter()
                .zip(&host.services)
                .any(|(&vuln, &running)| vuln && !running);
            if vulnerable_but_idle {
                return Err(ScenarioError::Invalid(format!(
                    "host {} is vulnerable through a service it does not run",
                    addr
                )));
            }
            if let Some(os) = host.os {
                if os >= self.num_os() {
                    return Err(ScenarioError::Invalid(format!(
                        "host {} has unknown OS id {}",
                        addr, os
                    )));
                }
            }
            if !is_valid_cost(host.value) {
                return Err(ScenarioError::Invalid(format!(
                    "host {} has invalid value {}",
                    addr, host.value
                )));
            }
            if host.sensitive && host.value == 0.0 {
                log::warn!("Sensitive host {} has value 0", addr);
            }
        }

        if seen.len() != self.num_hosts() {
            return Err(ScenarioError::Invalid(format!(
                "{} hosts declared but subnets hold {}",
                seen.len(),
                self.num_hosts()
            )));
        }

        for (&(src, dst), services) in &self.firewall {
            if src >= num_subnets || dst >= num_subnets {
                return Err(ScenarioError::Invalid(format!(
                    "firewall rule ({}, {}) references unknown subnet",
                    src, dst
                )));
            }
            if let Some(service) = services.iter().find(|&&s| s >= num_services) {
                return Err(ScenarioError::Invalid(format!(
                    "firewall rule ({}, {}) references unknown service id {}",
                    src, dst, service
                )));
            }
        }

        Ok(())
    }
}

fn is_valid_cost(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Errors raised while loading, generating or validating a scenario
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse scenario YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    #[error("Invalid generator parameters: {0}")]
    InvalidParams(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_subnet_scenario() -> Scenario {
        let host = |subnet, host, sensitive| HostConfig {
            address: Address::new(subnet, host),
            os: Some(0),
            services: vec![true, false],
            vulnerabilities: vec![true, false],
            value: if sensitive { 10.0 } else { 0.0 },
            sensitive,
        };
        Scenario {
            subnets: vec![1, 2],
            topology: vec![
                vec![true, true, false],
                vec![true, true, true],
                vec![false, true, true],
            ],
            services: vec!["ssh".to_string(), "ftp".to_string()],
            os: vec!["linux".to_string()],
            hosts: vec![host(1, 0, false), host(2, 0, false), host(2, 1, true)],
            firewall: BTreeMap::new(),
            exploits: BTreeMap::from([(0, ExploitConfig { cost: 1.0, prob: 0.8 })]),
            scan_cost: 1.0,
        }
    }

    #[test]
    fn test_address_space_order() {
        let scenario = two_subnet_scenario();
        assert_eq!(
            scenario.address_space(),
            vec![Address::new(1, 0), Address::new(2, 0), Address::new(2, 1)]
        );
        assert_eq!(scenario.num_hosts(), 3);
        assert_eq!(scenario.num_subnets(), 3);
        assert_eq!(scenario.sensitive_addresses(), vec![Address::new(2, 1)]);
    }

    #[test]
    fn test_valid_scenario() {
        assert!(two_subnet_scenario().validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut scenario = two_subnet_scenario();
        scenario.topology.pop();
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));

        let mut scenario = two_subnet_scenario();
        scenario.hosts[1].address = Address::new(3, 0);
        assert!(scenario.validate().is_err());

        let mut scenario = two_subnet_scenario();
        scenario.hosts.pop();
        assert!(scenario.validate().is_err());

        let mut scenario = two_subnet_scenario();
        scenario.hosts[0].vulnerabilities = vec![false, true];
        assert!(scenario.validate().is_err());

        let mut scenario = two_subnet_scenario();
        scenario.exploits.insert(1, ExploitConfig { cost: 1.0, prob: 1.5 });
        assert!(scenario.validate().is_err());

        let mut scenario = two_subnet_scenario();
        scenario.firewall.insert((0, 1), BTreeSet::from([7]));
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_internet_address() {
        assert!(INTERNET.is_internet());
        assert!(!Address::new(1, 0).is_internet());
        assert!(!Address::new(INTERNET_SUBNET, 5).is_internet());
        assert_eq!(Address::from((2, 3)).to_string(), "(2, 3)");
    }

    #[test]
    fn test_service_state_encoding() {
        assert_eq!(ServiceState::Present.encode(), 1.0);
        assert_eq!(ServiceState::Absent.encode(), -1.0);
        assert_eq!(ServiceState::Unknown.encode(), 0.0);
        assert_eq!(ServiceState::from_presence(false), ServiceState::Absent);
    }
}
