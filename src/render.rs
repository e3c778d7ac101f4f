//! Text rendering of the network and episodes.
//!
//! Rendering only reads the [`Network`] and [`State`]; nothing here feeds
//! back into the simulation.

use crate::action::Action;
use crate::network::Network;
use crate::scenario::Address;
use crate::state::State;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Available rendering modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// One row of host symbols per subnet
    #[default]
    Ascii,
    /// One line per host with every observed feature
    Readable,
}

impl RenderMode {
    pub const ALL: [RenderMode; 2] = [RenderMode::Ascii, RenderMode::Readable];

    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Ascii => "ascii",
            RenderMode::Readable => "readable",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown render mode '{}', expected one of: ascii, readable", s))
    }
}

/// One `(state, action, reward, done)` tuple of a stored episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStep {
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub done: bool,
}

pub struct Viewer<'a> {
    network: &'a Network,
}

impl<'a> Viewer<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self { network }
    }

    pub fn render(&self, state: &State, mode: RenderMode) -> String {
        match mode {
            RenderMode::Ascii => self.render_ascii(state),
            RenderMode::Readable => self.render_readable(state),
        }
    }

    /// Host symbols: `C`/`c` compromised, `R`/`r` reachable, `S`/`o`
    /// neither. Upper case marks sensitive hosts.
    pub fn render_ascii(&self, state: &State) -> String {
        let mut out = String::new();
        for (i, &size) in self.network.subnets().iter().enumerate() {
            let subnet = i + 1;
            let symbols: Vec<String> = (0..size)
                .map(|h| self.host_symbol(state, Address::new(subnet, h)).to_string())
                .collect();
            let _ = writeln!(out, "{:>3} | {}", subnet, symbols.join(" "));
        }
        out
    }

    pub fn render_readable(&self, state: &State) -> String {
        let mut out = String::new();
        let mut header = format!(
            "{:<10} {:<12} {:<10} {:<10} {:>7}",
            "Address", "Compromised", "Reachable", "Sensitive", "Value"
        );
        for service in 0..self.network.num_services() {
            let name = self.network.service_name(service).unwrap_or("?");
            let _ = write!(header, " {:>8}", name);
        }
        header.push_str("  OS");
        let _ = writeln!(out, "{}", header);

        for &addr in state.addresses() {
            let Some(host) = self.network.host(addr) else {
                continue;
            };
            let mut line = format!(
                "{:<10} {:<12} {:<10} {:<10} {:>7.1}",
                addr.to_string(),
                state.compromised(addr),
                state.reachable(addr),
                host.is_sensitive(),
                host.value()
            );
            for service in 0..self.network.num_services() {
                let _ = write!(line, " {:>8}", state.service(addr, service).symbol());
            }
            let os = state
                .os(addr)
                .and_then(|os| self.network.os_name(os))
                .unwrap_or("?");
            let _ = write!(line, "  {}", os);
            let _ = writeln!(out, "{}", line);
        }
        out
    }

    /// One ascii frame per stored step
    pub fn render_episode(&self, episode: &[EpisodeStep]) -> String {
        let mut out = String::new();
        let mut total = 0.0;
        for (i, step) in episode.iter().enumerate() {
            total += step.reward;
            let _ = writeln!(
                out,
                "Step {}: {} | reward={:.2} total={:.2} done={}",
                i + 1,
                step.action,
                step.reward,
                total,
                step.done
            );
            out.push_str(&self.render_ascii(&step.state));
        }
        out
    }

    /// GraphViz DOT: one cluster per subnet, edges between connected subnets
    pub fn render_network_graph(&self, state: &State) -> String {
        let mut out = String::new();
        out.push_str("graph network {\n");
        out.push_str("  compound=true;\n");
        out.push_str("  node [style=filled];\n");
        out.push_str("  subgraph cluster_0 {\n    label=\"internet\";\n");
        out.push_str("    \"internet\" [shape=diamond, fillcolor=lightblue];\n  }\n");

        for (i, &size) in self.network.subnets().iter().enumerate() {
            let subnet = i + 1;
            let _ = writeln!(
                out,
                "  subgraph cluster_{} {{\n    label=\"subnet {}\";",
                subnet, subnet
            );
            for h in 0..size {
                let addr = Address::new(subnet, h);
                let sensitive = self.network.host(addr).map_or(false, |host| host.is_sensitive());
                let colour = if state.compromised(addr) {
                    "red"
                } else if state.reachable(addr) {
                    "yellow"
                } else {
                    "white"
                };
                let shape = if sensitive { "doublecircle" } else { "circle" };
                let _ = writeln!(
                    out,
                    "    \"{}\" [label=\"{}\", shape={}, fillcolor={}];",
                    node_id(addr),
                    addr,
                    shape,
                    colour
                );
            }
            out.push_str("  }\n");
        }

        for (a, b) in self.network.graph().links() {
            let Some(to) = self.anchor(b) else {
                continue;
            };
            let from = if a == 0 {
                "internet".to_string()
            } else {
                match self.anchor(a) {
                    Some(anchor) => anchor,
                    None => continue,
                }
            };
            let mut attrs = vec![format!("lhead=cluster_{}", b)];
            if a != 0 {
                attrs.push(format!("ltail=cluster_{}", a));
            }
            let _ = writeln!(out, "  \"{}\" -- \"{}\" [{}];", from, to, attrs.join(", "));
        }
        out.push_str("}\n");
        out
    }

    fn host_symbol(&self, state: &State, addr: Address) -> char {
        let sensitive = self.network.host(addr).map_or(false, |host| host.is_sensitive());
        match (state.compromised(addr), state.reachable(addr), sensitive) {
            (true, _, true) => 'C',
            (true, _, false) => 'c',
            (false, true, true) => 'R',
            (false, true, false) => 'r',
            (false, false, true) => 'S',
            (false, false, false) => 'o',
        }
    }

    /// Node standing in for a subnet cluster in edges
    fn anchor(&self, subnet: usize) -> Option<String> {
        match self.network.subnets().get(subnet.checked_sub(1)?) {
            Some(&size) if size > 0 => Some(node_id(Address::new(subnet, 0))),
            _ => None,
        }
    }
}

fn node_id(addr: Address) -> String {
    format!("s{}_h{}", addr.subnet, addr.host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::parse_scenario;

    const SCENARIO: &str = r#"
subnets: [1, 2]
topology:
  - [1, 1, 0]
  - [1, 1, 1]
  - [0, 1, 1]
services: [ssh, http]
os: [linux]
exploits:
  http: { cost: 1.0, prob: 1.0 }
hosts:
  - { address: [1, 0], os: linux, services: [http] }
  - { address: [2, 0], services: [ssh] }
  - { address: [2, 1], services: [ssh], value: 10, sensitive: true }
"#;

    fn network() -> Network {
        Network::new(&parse_scenario(SCENARIO).unwrap())
    }

    #[test]
    fn test_render_mode_parsing() {
        assert_eq!("ASCII".parse::<RenderMode>(), Ok(RenderMode::Ascii));
        assert_eq!("readable".parse::<RenderMode>(), Ok(RenderMode::Readable));
        assert!("fancy".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_ascii_symbols() {
        let mut network = network();
        let dmz = Address::new(1, 0);
        let mut state = State::from_network(&network);
        assert_eq!(Viewer::new(&network).render_ascii(&state), "  1 | r\n  2 | o S\n");

        network.perform_action(&Action::exploit(dmz, 1, 1.0, 1.0));
        network.set_reachable(Address::new(2, 0));
        network.set_reachable(Address::new(2, 1));
        state.refresh(&network);
        assert_eq!(Viewer::new(&network).render_ascii(&state), "  1 | c\n  2 | r R\n");
    }

    #[test]
    fn test_readable_lists_every_host() {
        let network = network();
        let state = State::from_network(&network);
        let text = Viewer::new(&network).render_readable(&state);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("ssh") && lines[0].contains("http"));
        assert!(lines[3].starts_with("(2, 1)"));
    }

    #[test]
    fn test_render_episode() {
        let network = network();
        let state = State::from_network(&network);
        let episode = vec![EpisodeStep {
            state: state.snapshot(),
            action: Action::scan(Address::new(1, 0), 1.0),
            reward: -1.0,
            done: false,
        }];
        let text = Viewer::new(&network).render_episode(&episode);
        assert!(text.starts_with("Step 1: Scan: target=(1, 0)"));
        assert!(text.contains("total=-1.00"));
    }

    #[test]
    fn test_network_graph() {
        let network = network();
        let state = State::from_network(&network);
        let dot = Viewer::new(&network).render_network_graph(&state);
        assert!(dot.starts_with("graph network {"));
        assert!(dot.contains("\"s2_h1\" [label=\"(2, 1)\", shape=doublecircle, fillcolor=white];"));
        assert!(dot.contains("\"internet\" -- \"s1_h0\" [lhead=cluster_1];"));
        assert!(dot.contains("\"s1_h0\" -- \"s2_h0\" [lhead=cluster_2, ltail=cluster_1];"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
