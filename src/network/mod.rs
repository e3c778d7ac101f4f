//! Simulated network.
//!
//! The [`Network`] owns per-host compromise and observation state, the subnet
//! connectivity graph, the firewall rule table and the attacker's reachable
//! set. It applies actions but never checks their legality: reachability,
//! firewall permission and the probability gate are the environment's job.

pub mod firewall;
pub mod host;
pub mod topology;

pub use firewall::Firewall;
pub use host::{ActionOutcome, Host};
pub use topology::SubnetGraph;

use crate::action::Action;
use crate::scenario::{Address, Scenario, ServiceId, INTERNET_SUBNET};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct Network {
    subnets: Vec<usize>,
    graph: SubnetGraph,
    firewall: Firewall,
    hosts: BTreeMap<Address, Host>,
    address_space: Vec<Address>,
    reachable: BTreeSet<Address>,
    service_names: Vec<String>,
    os_names: Vec<String>,
}

impl Network {
    /// Build the network for a validated scenario, in its initial state
    pub fn new(scenario: &Scenario) -> Self {
        let hosts = scenario
            .hosts
            .iter()
            .map(|config| (config.address, Host::new(config)))
            .collect();
        let mut network = Self {
            subnets: scenario.subnets.clone(),
            graph: SubnetGraph::new(scenario.topology.clone()),
            firewall: Firewall::new(scenario.firewall.clone()),
            hosts,
            address_space: scenario.address_space(),
            reachable: BTreeSet::new(),
            service_names: scenario.services.clone(),
            os_names: scenario.os.clone(),
        };
        network.reset();
        network
    }

    /// Restore every host and shrink the reachable set back to the hosts of
    /// internet-adjacent subnets
    pub fn reset(&mut self) {
        for host in self.hosts.values_mut() {
            host.reset();
        }
        let graph = &self.graph;
        self.reachable = self
            .address_space
            .iter()
            .copied()
            .filter(|addr| graph.connected(INTERNET_SUBNET, addr.subnet))
            .collect();
    }

    pub fn reachable(&self, addr: Address) -> bool {
        addr.is_internet() || self.reachable.contains(&addr)
    }

    /// Monotonic within an episode
    pub fn set_reachable(&mut self, addr: Address) {
        self.reachable.insert(addr);
    }

    pub fn reachable_set(&self) -> &BTreeSet<Address> {
        &self.reachable
    }

    pub fn subnets_connected(&self, a: usize, b: usize) -> bool {
        self.graph.connected(a, b)
    }

    /// Firewall lookup. Traffic inside a subnet is never filtered; traffic
    /// between subnets needs a link and a rule permitting the service.
    pub fn traffic_permitted(&self, src: usize, dst: usize, service: ServiceId) -> bool {
        if src == dst {
            return true;
        }
        self.graph.connected(src, dst) && self.firewall.permits(src, dst, service)
    }

    /// Apply an action to its target. Unknown targets fail without effect.
    pub fn perform_action(&mut self, action: &Action) -> ActionOutcome {
        match self.hosts.get_mut(&action.target) {
            Some(host) => host.perform_action(action),
            None => ActionOutcome::failure(),
        }
    }

    pub fn compromised(&self, addr: Address) -> bool {
        if addr.is_internet() {
            return true;
        }
        self.hosts.get(&addr).map_or(false, Host::is_compromised)
    }

    pub fn sensitive_hosts(&self) -> BTreeSet<Address> {
        self.hosts
            .values()
            .filter(|h| h.is_sensitive())
            .map(Host::address)
            .collect()
    }

    pub fn total_sensitive_host_value(&self) -> f64 {
        self.hosts
            .values()
            .filter(|h| h.is_sensitive())
            .map(Host::value)
            .sum()
    }

    /// Fewest exploits needed to compromise every sensitive host: one per
    /// sensitive host, plus the fewest other subnets that must be taken so
    /// that every sensitive subnet can be reached. Firewall rules are
    /// ignored, so this is a lower bound.
    pub fn minimal_steps(&self) -> usize {
        let sensitive = self.sensitive_hosts();
        let reachable = self.graph.reachable_from_internet();

        let mut targets = BTreeSet::new();
        for addr in &sensitive {
            if reachable.get(addr.subnet).copied().unwrap_or(false) {
                targets.insert(addr.subnet);
            } else {
                log::warn!("Sensitive host {} is unreachable from the internet", addr);
            }
        }
        let targets: Vec<usize> = targets.into_iter().collect();
        let stepping_stones = self.graph.min_stepping_stones(&targets).unwrap_or_default();
        sensitive.len() + stepping_stones
    }

    pub fn host(&self, addr: Address) -> Option<&Host> {
        self.hosts.get(&addr)
    }

    pub fn address_space(&self) -> &[Address] {
        &self.address_space
    }

    /// Host count of each real subnet
    pub fn subnets(&self) -> &[usize] {
        &self.subnets
    }

    pub fn graph(&self) -> &SubnetGraph {
        &self.graph
    }

    pub fn num_services(&self) -> usize {
        self.service_names.len()
    }

    pub fn num_os(&self) -> usize {
        self.os_names.len()
    }

    pub fn service_name(&self, service: ServiceId) -> Option<&str> {
        self.service_names.get(service).map(String::as_str)
    }

    pub fn os_name(&self, os: usize) -> Option<&str> {
        self.os_names.get(os).map(String::as_str)
    }
}
