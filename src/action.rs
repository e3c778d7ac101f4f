//! Attacker actions and the action space.
//!
//! An [`Action`] is an immutable description of one capability applied to one
//! target. The [`ActionSpace`] is derived once from a scenario and its
//! indices stay stable for the scenario's lifetime.

use crate::scenario::{Address, Scenario, ServiceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Scan or exploit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Gathers service and OS information, bypasses the firewall
    Scan,
    /// Attempts to compromise the target through a service
    Exploit,
}

/// A single attacker action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub target: Address,
    /// Charged on every attempt, whatever the outcome
    pub cost: f64,
    pub prob: f64,
    pub service: Option<ServiceId>,
    pub kind: ActionKind,
}

impl Action {
    /// Scans always succeed once they get past reachability
    pub fn scan(target: Address, cost: f64) -> Self {
        Self {
            target,
            cost,
            prob: 1.0,
            service: None,
            kind: ActionKind::Scan,
        }
    }

    pub fn exploit(target: Address, service: ServiceId, cost: f64, prob: f64) -> Self {
        Self {
            target,
            cost,
            prob,
            service: Some(service),
            kind: ActionKind::Exploit,
        }
    }

    pub fn is_scan(&self) -> bool {
        self.kind == ActionKind::Scan
    }

    pub fn is_exploit(&self) -> bool {
        self.kind == ActionKind::Exploit
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.service) {
            (ActionKind::Exploit, Some(service)) => write!(
                f,
                "Exploit: target={}, service={}, cost={:.2}, prob={:.2}",
                self.target, service, self.cost, self.prob
            ),
            _ => write!(f, "Scan: target={}, cost={:.2}", self.target, self.cost),
        }
    }
}

/// Ordered, fixed-length set of every action a scenario allows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpace {
    actions: Vec<Action>,
}

impl ActionSpace {
    /// For each address in order: one scan, then one exploit per exploitable
    /// service in service-id order.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut actions = Vec::new();
        for target in scenario.address_space() {
            actions.push(Action::scan(target, scenario.scan_cost));
            for (&service, exploit) in &scenario.exploits {
                actions.push(Action::exploit(target, service, exploit.cost, exploit.prob));
            }
        }
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }
}

impl Index<usize> for ActionSpace {
    type Output = Action;

    fn index(&self, index: usize) -> &Action {
        &self.actions[index]
    }
}

impl<'a> IntoIterator for &'a ActionSpace {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{generate_scenario, GeneratorParams};

    #[test]
    fn test_action_space_layout() {
        let scenario = generate_scenario(4, 2, &GeneratorParams::default()).unwrap();
        let space = ActionSpace::from_scenario(&scenario);

        // one scan + two exploits per host
        assert_eq!(space.len(), 4 * 3);
        assert!(space[0].is_scan());
        assert_eq!(space[0].target, Address::new(1, 0));
        assert_eq!(space[1].service, Some(0));
        assert_eq!(space[2].service, Some(1));
        assert_eq!(space[3].target, Address::new(2, 0));
        assert!(space.get(space.len()).is_none());
    }

    #[test]
    fn test_iteration_order_matches_indices() {
        let scenario = generate_scenario(3, 1, &GeneratorParams::default()).unwrap();
        let space = ActionSpace::from_scenario(&scenario);
        for (i, action) in (&space).into_iter().enumerate() {
            assert_eq!(&space[i], action);
            assert_eq!(action.is_scan(), i % 2 == 0);
        }
    }

    #[test]
    fn test_display() {
        let scan = Action::scan(Address::new(1, 0), 1.0);
        assert_eq!(scan.to_string(), "Scan: target=(1, 0), cost=1.00");
        let exploit = Action::exploit(Address::new(2, 1), 3, 2.0, 0.5);
        assert_eq!(exploit.to_string(), "Exploit: target=(2, 1), service=3, cost=2.00, prob=0.50");
    }
}
