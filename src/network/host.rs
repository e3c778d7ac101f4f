//! Per-host simulation state.

use crate::action::{Action, ActionKind};
use crate::scenario::{Address, HostConfig, OsId, ServiceId, ServiceState};
use std::collections::BTreeMap;

/// What the attacker learns from a single action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    /// Reward earned, non-zero only on the first compromise of a host
    pub value: f64,
    /// Service presence revealed by the action
    pub services: BTreeMap<ServiceId, bool>,
    pub os: Option<OsId>,
}

impl ActionOutcome {
    pub fn failure() -> Self {
        Self {
            success: false,
            value: 0.0,
            services: BTreeMap::new(),
            os: None,
        }
    }
}

/// A host on the simulated network
#[derive(Debug, Clone)]
pub struct Host {
    address: Address,
    os: Option<OsId>,
    services: Vec<bool>,
    vulnerabilities: Vec<bool>,
    value: f64,
    sensitive: bool,
    compromised: bool,
    observed_services: Vec<ServiceState>,
    os_observed: bool,
}

impl Host {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            address: config.address,
            os: config.os,
            services: config.services.clone(),
            vulnerabilities: config.vulnerabilities.clone(),
            value: config.value,
            sensitive: config.sensitive,
            compromised: false,
            observed_services: vec![ServiceState::Unknown; config.services.len()],
            os_observed: false,
        }
    }

    /// Forget everything the attacker has done to this host
    pub fn reset(&mut self) {
        self.compromised = false;
        self.observed_services.fill(ServiceState::Unknown);
        self.os_observed = false;
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn os(&self) -> Option<OsId> {
        self.os
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    pub fn is_compromised(&self) -> bool {
        self.compromised
    }

    pub fn runs_service(&self, service: ServiceId) -> bool {
        self.services.get(service).copied().unwrap_or(false)
    }

    pub fn is_vulnerable(&self, service: ServiceId) -> bool {
        self.runs_service(service) && self.vulnerabilities.get(service).copied().unwrap_or(false)
    }

    pub fn observed_service(&self, service: ServiceId) -> ServiceState {
        self.observed_services
            .get(service)
            .copied()
            .unwrap_or(ServiceState::Unknown)
    }

    pub fn observed_os(&self) -> Option<OsId> {
        if self.os_observed {
            self.os
        } else {
            None
        }
    }

    pub fn num_services(&self) -> usize {
        self.services.len()
    }

    /// Apply an action that has already passed every legality check.
    ///
    /// Scans always reveal services and OS. Exploits compromise the host when
    /// the service is running and vulnerable, and reveal the same information
    /// only on success.
    pub fn perform_action(&mut self, action: &Action) -> ActionOutcome {
        match action.kind {
            ActionKind::Scan => {
                self.observe();
                ActionOutcome {
                    success: true,
                    value: 0.0,
                    services: self.service_map(),
                    os: self.os,
                }
            }
            ActionKind::Exploit => {
                let exploitable = action.service.map_or(false, |s| self.is_vulnerable(s));
                if !exploitable {
                    return ActionOutcome::failure();
                }
                let value = if self.compromised { 0.0 } else { self.value };
                self.compromised = true;
                self.observe();
                ActionOutcome {
                    success: true,
                    value,
                    services: self.service_map(),
                    os: self.os,
                }
            }
        }
    }

    fn observe(&mut self) {
        for (observed, &present) in self.observed_services.iter_mut().zip(&self.services) {
            *observed = ServiceState::from_presence(present);
        }
        self.os_observed = true;
    }

    fn service_map(&self) -> BTreeMap<ServiceId, bool> {
        self.services.iter().copied().enumerate().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host::new(&HostConfig {
            address: Address::new(1, 0),
            os: Some(1),
            services: vec![true, true, false],
            vulnerabilities: vec![false, true, false],
            value: 10.0,
            sensitive: true,
        })
    }

    #[test]
    fn test_scan_reveals_services() {
        let mut host = host();
        assert_eq!(host.observed_service(0), ServiceState::Unknown);

        let outcome = host.perform_action(&Action::scan(host.address(), 1.0));
        assert!(outcome.success);
        assert_eq!(outcome.value, 0.0);
        assert_eq!(outcome.services, BTreeMap::from([(0, true), (1, true), (2, false)]));
        assert_eq!(outcome.os, Some(1));
        assert!(!host.is_compromised());
        assert_eq!(host.observed_service(2), ServiceState::Absent);
        assert_eq!(host.observed_os(), Some(1));
    }

    #[test]
    fn test_exploit_requires_vulnerable_service() {
        let mut host = host();
        let outcome = host.perform_action(&Action::exploit(host.address(), 0, 1.0, 1.0));
        assert_eq!(outcome, ActionOutcome::failure());
        assert!(!host.is_compromised());
        assert_eq!(host.observed_service(0), ServiceState::Unknown);

        let outcome = host.perform_action(&Action::exploit(host.address(), 2, 1.0, 1.0));
        assert!(!outcome.success);
    }

    #[test]
    fn test_value_only_on_first_compromise() {
        let mut host = host();
        let exploit = Action::exploit(host.address(), 1, 1.0, 1.0);

        let first = host.perform_action(&exploit);
        assert!(first.success);
        assert_eq!(first.value, 10.0);
        assert!(host.is_compromised());

        let second = host.perform_action(&exploit);
        assert!(second.success);
        assert_eq!(second.value, 0.0);
    }

    #[test]
    fn test_reset() {
        let mut host = host();
        host.perform_action(&Action::exploit(host.address(), 1, 1.0, 1.0));
        host.reset();
        assert!(!host.is_compromised());
        assert_eq!(host.observed_service(1), ServiceState::Unknown);
        assert_eq!(host.observed_os(), None);
    }
}
