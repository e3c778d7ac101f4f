//! Observation encoding.
//!
//! A [`State`] is a fixed-shape matrix with one row per host and the columns
//!
//! | column                      | meaning                                   |
//! |-----------------------------|-------------------------------------------|
//! | 0                           | compromised (1.0 / 0.0)                   |
//! | 1                           | reachable (1.0 / 0.0)                     |
//! | 2 .. 2 + services           | observed service, see [`ServiceState`]    |
//! | 2 + services .. + os        | observed OS, one-hot (1.0 / -1.0), 0.0 if unknown |
//!
//! The environment keeps a single `State` and patches it in place; anything
//! that needs history must take a [`State::snapshot`].

use crate::network::Network;
use crate::scenario::{Address, ServiceId, ServiceState};
use serde::{Deserialize, Serialize};

const COMPROMISED: usize = 0;
const REACHABLE: usize = 1;
const SERVICE_OFFSET: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Row order, sorted
    addresses: Vec<Address>,
    num_services: usize,
    num_os: usize,
    num_features: usize,
    data: Vec<f64>,
}

impl State {
    /// Encode the current network
    pub fn from_network(network: &Network) -> Self {
        let num_services = network.num_services();
        let num_os = network.num_os();
        let num_features = SERVICE_OFFSET + num_services + num_os;
        let addresses = network.address_space().to_vec();
        let mut state = Self {
            data: vec![0.0; addresses.len() * num_features],
            addresses,
            num_services,
            num_os,
            num_features,
        };
        state.refresh(network);
        state
    }

    /// Re-encode every row from the network without reallocating
    pub fn refresh(&mut self, network: &Network) {
        for row in 0..self.addresses.len() {
            self.write_row(network, row);
        }
    }

    /// Re-encode the row of a single address. Unknown addresses are ignored.
    pub fn update(&mut self, network: &Network, addr: Address) {
        if let Some(row) = self.row_index(addr) {
            self.write_row(network, row);
        }
    }

    fn write_row(&mut self, network: &Network, row: usize) {
        let addr = self.addresses[row];
        let (num_services, num_os) = (self.num_services, self.num_os);
        let start = row * self.num_features;
        let features = &mut self.data[start..start + self.num_features];
        features.fill(0.0);

        let Some(host) = network.host(addr) else {
            return;
        };
        features[COMPROMISED] = flag(host.is_compromised());
        features[REACHABLE] = flag(network.reachable(addr));
        for service in 0..num_services {
            features[SERVICE_OFFSET + service] = host.observed_service(service).encode();
        }
        if let Some(os) = host.observed_os() {
            let os_offset = SERVICE_OFFSET + num_services;
            for i in 0..num_os {
                features[os_offset + i] = if i == os { 1.0 } else { -1.0 };
            }
        }
    }

    /// Independent copy for callers that keep history across steps
    pub fn snapshot(&self) -> State {
        self.clone()
    }

    /// Total number of features (hosts x features per host)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `(hosts, features per host)`
    pub fn shape(&self) -> (usize, usize) {
        (self.addresses.len(), self.num_features)
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Flat row-major feature vector
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, addr: Address) -> Option<&[f64]> {
        let row = self.row_index(addr)?;
        let start = row * self.num_features;
        Some(&self.data[start..start + self.num_features])
    }

    pub fn compromised(&self, addr: Address) -> bool {
        self.row(addr).map_or(false, |r| r[COMPROMISED] == 1.0)
    }

    pub fn reachable(&self, addr: Address) -> bool {
        self.row(addr).map_or(false, |r| r[REACHABLE] == 1.0)
    }

    pub fn service(&self, addr: Address, service: ServiceId) -> ServiceState {
        if service >= self.num_services {
            return ServiceState::Unknown;
        }
        match self.row(addr).map(|r| r[SERVICE_OFFSET + service]) {
            Some(v) if v > 0.0 => ServiceState::Present,
            Some(v) if v < 0.0 => ServiceState::Absent,
            _ => ServiceState::Unknown,
        }
    }

    pub fn os(&self, addr: Address) -> Option<usize> {
        let row = self.row(addr)?;
        let os_offset = SERVICE_OFFSET + self.num_services;
        row[os_offset..os_offset + self.num_os]
            .iter()
            .position(|&v| v == 1.0)
    }

    fn row_index(&self, addr: Address) -> Option<usize> {
        self.addresses.binary_search(&addr).ok()
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::scenario::parse_scenario;

    const SCENARIO: &str = r#"
subnets: [1, 1]
topology:
  - [1, 1, 0]
  - [1, 1, 1]
  - [0, 1, 1]
services: [ssh, http, smb]
os: [linux, windows]
exploits:
  http: { cost: 1.0, prob: 1.0 }
firewall:
  - { src: 0, dst: 1, services: [http] }
hosts:
  - { address: [1, 0], os: windows, services: [http] }
  - { address: [2, 0], os: linux, services: [ssh], value: 10, sensitive: true }
"#;

    fn network() -> Network {
        Network::new(&parse_scenario(SCENARIO).unwrap())
    }

    #[test]
    fn test_initial_encoding() {
        let state = State::from_network(&network());
        assert_eq!(state.shape(), (2, 2 + 3 + 2));
        assert_eq!(state.size(), 14);

        let dmz = Address::new(1, 0);
        assert!(!state.compromised(dmz));
        assert!(state.reachable(dmz));
        assert!(!state.reachable(Address::new(2, 0)));
        assert_eq!(state.service(dmz, 1), ServiceState::Unknown);
        assert_eq!(state.os(dmz), None);
    }

    #[test]
    fn test_update_after_scan() {
        let mut network = network();
        let mut state = State::from_network(&network);
        let dmz = Address::new(1, 0);

        network.perform_action(&Action::scan(dmz, 1.0));
        state.update(&network, dmz);

        assert_eq!(state.row(dmz).unwrap(), &[0.0, 1.0, -1.0, 1.0, -1.0, -1.0, 1.0]);
        assert_eq!(state.service(dmz, 1), ServiceState::Present);
        assert_eq!(state.service(dmz, 0), ServiceState::Absent);
        assert_eq!(state.os(dmz), Some(1));
    }

    #[test]
    fn test_flat_layout_is_row_major() {
        let mut network = network();
        let mut state = State::from_network(&network);
        let target = Address::new(2, 0);

        network.set_reachable(target);
        network.perform_action(&Action::scan(target, 1.0));
        state.update(&network, target);

        let flat = state.as_slice();
        assert_eq!(flat.len(), state.size());
        #[rustfmt::skip]
        let expected = [
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0,
        ];
        assert_eq!(flat, &expected[..]);
        assert_eq!(&flat[7..14], state.row(target).unwrap());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut network = network();
        let mut state = State::from_network(&network);
        let before = state.snapshot();
        let dmz = Address::new(1, 0);

        network.perform_action(&Action::exploit(dmz, 1, 1.0, 1.0));
        state.update(&network, dmz);

        assert!(state.compromised(dmz));
        assert!(!before.compromised(dmz));
        assert_eq!(before.shape(), state.shape());
    }

    #[test]
    fn test_refresh_matches_fresh_encoding() {
        let mut network = network();
        let mut state = State::from_network(&network);
        network.perform_action(&Action::exploit(Address::new(1, 0), 1, 1.0, 1.0));
        state.update(&network, Address::new(1, 0));

        network.reset();
        state.refresh(&network);
        assert_eq!(state, State::from_network(&network));
    }
}
