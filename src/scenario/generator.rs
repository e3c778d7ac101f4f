//! Procedural scenario generation.
//!
//! Generated networks follow a fixed layout: a single-host DMZ facing the
//! internet, a single-host sensitive subnet behind it, and a chain of user
//! subnets that loops back to the sensitive subnet. Services, vulnerabilities,
//! operating systems and firewall rules are drawn from a seeded generator so
//! the same parameters always produce the same scenario.

use crate::scenario::types::{
    Address, ExploitConfig, HostConfig, Scenario, ScenarioError, ServiceId, INTERNET_SUBNET,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Smallest network the generator can lay out (DMZ, sensitive, one user host)
pub const MIN_HOSTS: usize = 3;
pub const MIN_SERVICES: usize = 1;

const DMZ_SUBNET: usize = 1;
const SENSITIVE_SUBNET: usize = 2;
const USER_SUBNET_START: usize = 3;

/// Tuning knobs for [`generate_scenario`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorParams {
    pub seed: u64,
    /// Maximum number of hosts in each user subnet
    pub max_subnet_size: usize,
    pub num_os: usize,
    /// Probability that a host runs any given service
    pub service_prob: f64,
    /// Probability that a running service is exploitable
    pub vulnerability_prob: f64,
    /// Probability that a service is blocked between two connected subnets
    pub restrictiveness: f64,
    pub exploit_cost: f64,
    pub scan_cost: f64,
    /// Success probability of every exploit when `uniform` is set
    pub exploit_prob: f64,
    /// If false, exploit probabilities are drawn from [0.3, 1.0]
    pub uniform: bool,
    pub r_sensitive: f64,
    pub r_user: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            seed: 0,
            max_subnet_size: 5,
            num_os: 2,
            service_prob: 0.5,
            vulnerability_prob: 0.5,
            restrictiveness: 0.5,
            exploit_cost: 1.0,
            scan_cost: 1.0,
            exploit_prob: 1.0,
            uniform: true,
            r_sensitive: 10.0,
            r_user: 10.0,
        }
    }
}

impl GeneratorParams {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.max_subnet_size == 0 {
            return Err(ScenarioError::InvalidParams(
                "max_subnet_size must be at least 1".to_string(),
            ));
        }
        if self.num_os == 0 {
            return Err(ScenarioError::InvalidParams("num_os must be at least 1".to_string()));
        }
        let probabilities = [
            ("service_prob", self.service_prob),
            ("vulnerability_prob", self.vulnerability_prob),
            ("restrictiveness", self.restrictiveness),
            ("exploit_prob", self.exploit_prob),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScenarioError::InvalidParams(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        let amounts = [
            ("exploit_cost", self.exploit_cost),
            ("scan_cost", self.scan_cost),
            ("r_sensitive", self.r_sensitive),
            ("r_user", self.r_user),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(ScenarioError::InvalidParams(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Generate a scenario with `num_hosts` hosts and `num_services` services
pub fn generate_scenario(
    num_hosts: usize,
    num_services: usize,
    params: &GeneratorParams,
) -> Result<Scenario, ScenarioError> {
    if num_hosts < MIN_HOSTS {
        return Err(ScenarioError::InvalidParams(format!(
            "number of hosts must be at least {}, got {}",
            MIN_HOSTS, num_hosts
        )));
    }
    if num_services < MIN_SERVICES {
        return Err(ScenarioError::InvalidParams(format!(
            "number of services must be at least {}, got {}",
            MIN_SERVICES, num_services
        )));
    }
    params.validate()?;

    let mut rng = StdRng::seed_from_u64(params.seed);

    let subnets = generate_subnets(num_hosts, params.max_subnet_size);
    let topology = generate_topology(subnets.len() + 1);
    let last_user = Address::new(subnets.len(), subnets[subnets.len() - 1] - 1);

    let mut hosts = Vec::with_capacity(num_hosts);
    for (i, &size) in subnets.iter().enumerate() {
        for h in 0..size {
            let address = Address::new(i + 1, h);
            let (sensitive, value) = if address.subnet == SENSITIVE_SUBNET {
                (true, params.r_sensitive)
            } else if address == last_user {
                (true, params.r_user)
            } else {
                (false, 0.0)
            };
            let services = random_mask(&mut rng, num_services, params.service_prob, None);
            let vulnerabilities =
                random_mask(&mut rng, num_services, params.vulnerability_prob, Some(&services));
            hosts.push(HostConfig {
                address,
                os: Some(rng.gen_range(0..params.num_os)),
                services,
                vulnerabilities,
                value,
                sensitive,
            });
        }
    }

    let firewall = generate_firewall(&mut rng, &topology, &hosts, params.restrictiveness);

    let exploits = (0..num_services)
        .map(|service| {
            let prob = if params.uniform {
                params.exploit_prob
            } else {
                rng.gen_range(0.3..=1.0)
            };
            (service, ExploitConfig { cost: params.exploit_cost, prob })
        })
        .collect();

    let scenario = Scenario {
        subnets,
        topology,
        services: (0..num_services).map(|i| format!("srv_{}", i)).collect(),
        os: (0..params.num_os).map(|i| format!("os_{}", i)).collect(),
        hosts,
        firewall,
        exploits,
        scan_cost: params.scan_cost,
    };
    scenario.validate()?;

    log::debug!(
        "Generated scenario: subnets={:?}, services={}, seed={}",
        scenario.subnets,
        num_services,
        params.seed
    );
    Ok(scenario)
}

fn generate_subnets(num_hosts: usize, max_subnet_size: usize) -> Vec<usize> {
    let mut subnets = vec![1, 1];
    let mut remaining = num_hosts - 2;
    while remaining > 0 {
        let size = remaining.min(max_subnet_size);
        subnets.push(size);
        remaining -= size;
    }
    subnets
}

fn generate_topology(num_subnets: usize) -> Vec<Vec<bool>> {
    let mut topology = vec![vec![false; num_subnets]; num_subnets];
    let mut connect = |a: usize, b: usize| {
        topology[a][b] = true;
        topology[b][a] = true;
    };

    for s in 0..num_subnets {
        connect(s, s);
    }
    connect(INTERNET_SUBNET, DMZ_SUBNET);
    connect(DMZ_SUBNET, SENSITIVE_SUBNET);
    connect(DMZ_SUBNET, USER_SUBNET_START);
    for s in USER_SUBNET_START..num_subnets - 1 {
        connect(s, s + 1);
    }
    connect(num_subnets - 1, SENSITIVE_SUBNET);
    topology
}

/// Draw a non-empty mask with each entry set with probability `prob`.
/// When `within` is given only its set entries may be chosen.
fn random_mask(rng: &mut StdRng, len: usize, prob: f64, within: Option<&[bool]>) -> Vec<bool> {
    let allowed: Vec<usize> = (0..len)
        .filter(|&i| within.map_or(true, |mask| mask[i]))
        .collect();
    let mut mask = vec![false; len];
    for &i in &allowed {
        mask[i] = rng.gen_bool(prob);
    }
    if !mask.iter().any(|&set| set) {
        if let Some(&i) = allowed.choose(rng) {
            mask[i] = true;
        }
    }
    mask
}

fn generate_firewall(
    rng: &mut StdRng,
    topology: &[Vec<bool>],
    hosts: &[HostConfig],
    restrictiveness: f64,
) -> BTreeMap<(usize, usize), BTreeSet<ServiceId>> {
    let mut firewall = BTreeMap::new();
    for src in 0..topology.len() {
        for dst in 1..topology.len() {
            if src == dst || !topology[src][dst] {
                continue;
            }
            let dst_hosts: Vec<&HostConfig> =
                hosts.iter().filter(|h| h.address.subnet == dst).collect();
            let running: BTreeSet<ServiceId> = dst_hosts
                .iter()
                .flat_map(|h| h.services.iter().enumerate().filter(|(_, &on)| on).map(|(s, _)| s))
                .collect();
            let vulnerable: Vec<ServiceId> = dst_hosts
                .iter()
                .flat_map(|h| {
                    h.vulnerabilities.iter().enumerate().filter(|(_, &on)| on).map(|(s, _)| s)
                })
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let mut permitted: BTreeSet<ServiceId> = running
                .into_iter()
                .filter(|_| rng.gen::<f64>() >= restrictiveness)
                .collect();
            // Keep every connected subnet exploitable from its neighbours
            if !vulnerable.iter().any(|s| permitted.contains(s)) {
                if let Some(&s) = vulnerable.choose(rng) {
                    permitted.insert(s);
                }
            }
            firewall.insert((src, dst), permitted);
        }
    }
    firewall
}
