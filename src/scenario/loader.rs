//! Scenario file loading.
//!
//! Scenario files are YAML documents that refer to services and operating
//! systems by name. Loading resolves names to ids and validates the result.

use crate::scenario::generator::GeneratorParams;
use crate::scenario::types::{
    Address, ExploitConfig, HostConfig, Scenario, ScenarioError, ServiceId,
};
use log::info;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

fn default_scan_cost() -> f64 {
    1.0
}

/// Scenario as written in a YAML file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub subnets: Vec<usize>,
    /// 0/1 adjacency matrix, row 0 is the internet
    pub topology: Vec<Vec<u8>>,
    pub services: Vec<String>,
    #[serde(default)]
    pub os: Vec<String>,
    /// Exploit definitions keyed by service name
    pub exploits: BTreeMap<String, ExploitConfig>,
    #[serde(default = "default_scan_cost")]
    pub scan_cost: f64,
    #[serde(default)]
    pub firewall: Vec<FirewallRuleFile>,
    pub hosts: Vec<HostFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallRuleFile {
    pub src: usize,
    pub dst: usize,
    pub services: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostFile {
    pub address: Address,
    #[serde(default)]
    pub os: Option<String>,
    pub services: Vec<String>,
    /// Defaults to every running service
    #[serde(default)]
    pub vulnerabilities: Option<Vec<String>>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub sensitive: bool,
}

impl ScenarioFile {
    /// Resolve service and OS names, then validate
    pub fn into_scenario(self) -> Result<Scenario, ScenarioError> {
        let service_ids: BTreeMap<&str, ServiceId> = self
            .services
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        if service_ids.len() != self.services.len() {
            return Err(ScenarioError::Invalid("service names must be unique".to_string()));
        }
        let os_ids: BTreeMap<&str, usize> = self
            .os
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let lookup_service = |name: &str| -> Result<ServiceId, ScenarioError> {
            service_ids
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::Invalid(format!("unknown service '{}'", name)))
        };

        let num_services = self.services.len();
        let to_mask = |names: &[String]| -> Result<Vec<bool>, ScenarioError> {
            let mut mask = vec![false; num_services];
            for name in names {
                mask[lookup_service(name)?] = true;
            }
            Ok(mask)
        };

        let mut hosts = Vec::with_capacity(self.hosts.len());
        for host in &self.hosts {
            let services = to_mask(&host.services)?;
            let vulnerabilities = match &host.vulnerabilities {
                Some(names) => to_mask(names)?,
                None => services.clone(),
            };
            let os = match &host.os {
                Some(name) => Some(os_ids.get(name.as_str()).copied().ok_or_else(|| {
                    ScenarioError::Invalid(format!(
                        "host {} has unknown OS '{}'",
                        host.address, name
                    ))
                })?),
                None => None,
            };
            hosts.push(HostConfig {
                address: host.address,
                os,
                services,
                vulnerabilities,
                value: host.value,
                sensitive: host.sensitive,
            });
        }
        hosts.sort_by_key(|h| h.address);

        let mut exploits = BTreeMap::new();
        for (name, exploit) in &self.exploits {
            exploits.insert(lookup_service(name)?, *exploit);
        }

        let mut firewall: BTreeMap<(usize, usize), BTreeSet<ServiceId>> = BTreeMap::new();
        for rule in &self.firewall {
            let permitted = firewall.entry((rule.src, rule.dst)).or_default();
            for name in &rule.services {
                permitted.insert(lookup_service(name)?);
            }
        }

        let topology = self
            .topology
            .iter()
            .map(|row| row.iter().map(|&v| v != 0).collect())
            .collect();

        let scenario = Scenario {
            subnets: self.subnets,
            topology,
            services: self.services,
            os: self.os,
            hosts,
            firewall,
            exploits,
            scan_cost: self.scan_cost,
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

/// Parse a scenario from YAML text
pub fn parse_scenario(yaml: &str) -> Result<Scenario, ScenarioError> {
    let file: ScenarioFile = serde_yaml::from_str(yaml)?;
    file.into_scenario()
}

/// Load and validate a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    info!("Loading scenario from: {:?}", path);

    let file = File::open(path)?;
    let raw: ScenarioFile = serde_yaml::from_reader(file)?;
    let scenario = raw.into_scenario()?;

    info!(
        "Loaded scenario: subnets={:?}, services={}, sensitive hosts={}",
        scenario.subnets,
        scenario.num_services(),
        scenario.sensitive_addresses().len()
    );
    Ok(scenario)
}

/// Load generator parameters from a YAML file. Missing fields take defaults.
pub fn load_generator_params(path: &Path) -> Result<GeneratorParams, ScenarioError> {
    info!("Loading generator parameters from: {:?}", path);
    let file = File::open(path)?;
    let params: GeneratorParams = serde_yaml::from_reader(file)?;
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TINY: &str = r#"
subnets: [1, 1]
topology:
  - [1, 1, 0]
  - [1, 1, 1]
  - [0, 1, 1]
services: [ssh, http]
os: [linux, windows]
exploits:
  ssh: { cost: 1.0, prob: 0.5 }
  http: { cost: 2.0, prob: 1.0 }
scan_cost: 0.5
firewall:
  - { src: 0, dst: 1, services: [http] }
  - { src: 1, dst: 2, services: [ssh, http] }
hosts:
  - address: [1, 0]
    os: linux
    services: [http]
  - address: [2, 0]
    os: windows
    services: [ssh, http]
    vulnerabilities: [ssh]
    value: 10
    sensitive: true
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = parse_scenario(TINY).unwrap();
        assert_eq!(scenario.subnets, vec![1, 1]);
        assert_eq!(scenario.num_services(), 2);
        assert_eq!(scenario.scan_cost, 0.5);
        assert!(scenario.topology[1][2]);
        assert!(!scenario.topology[0][2]);

        let dmz = scenario.host(Address::new(1, 0)).unwrap();
        assert_eq!(dmz.services, vec![false, true]);
        assert_eq!(dmz.vulnerabilities, vec![false, true]);
        assert_eq!(dmz.os, Some(0));

        let target = scenario.host(Address::new(2, 0)).unwrap();
        assert_eq!(target.vulnerabilities, vec![true, false]);
        assert!(target.sensitive);
        assert_eq!(target.value, 10.0);

        assert_eq!(scenario.firewall[&(0, 1)], BTreeSet::from([1]));
        assert_eq!(scenario.exploits[&0].prob, 0.5);
    }

    #[test]
    fn test_load_scenario_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", TINY).unwrap();

        let scenario = load_scenario(temp_file.path()).unwrap();
        assert_eq!(scenario.sensitive_addresses(), vec![Address::new(2, 0)]);
    }

    #[test]
    fn test_unknown_service_rejected() {
        let yaml = TINY.replace("services: [http]\n", "services: [telnet]\n");
        assert!(matches!(parse_scenario(&yaml), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(matches!(parse_scenario("subnets: [1"), Err(ScenarioError::Yaml(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_scenario(Path::new("/nonexistent/scenario.yaml"));
        assert!(matches!(result, Err(ScenarioError::Io(_))));
    }

    #[test]
    fn test_load_generator_params_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "seed: 7\nrestrictiveness: 0.2\n").unwrap();

        let params = load_generator_params(temp_file.path()).unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.restrictiveness, 0.2);
        assert_eq!(params.max_subnet_size, GeneratorParams::default().max_subnet_size);
    }
}
