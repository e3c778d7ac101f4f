//! Subnet connectivity graph.
//!
//! Connectivity is pure topology: it says nothing about firewall policy or
//! what the attacker has compromised.

use crate::scenario::INTERNET_SUBNET;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

const UNREACHED: usize = usize::MAX;

/// Adjacency between subnets, the internet included as subnet 0
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetGraph {
    adjacency: Vec<Vec<bool>>,
}

impl SubnetGraph {
    pub fn new(adjacency: Vec<Vec<bool>>) -> Self {
        Self { adjacency }
    }

    pub fn num_subnets(&self) -> usize {
        self.adjacency.len()
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(a)
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(false)
    }

    /// Distinct subnet pairs `(a, b)` with `a < b` that are connected in
    /// either direction
    pub fn links(&self) -> Vec<(usize, usize)> {
        let n = self.num_subnets();
        let mut links = Vec::new();
        for a in 0..n {
            for b in (a + 1)..n {
                if self.connected(a, b) || self.connected(b, a) {
                    links.push((a, b));
                }
            }
        }
        links
    }

    /// Subnets reachable from the internet by following links, indexed by
    /// subnet id
    pub fn reachable_from_internet(&self) -> Vec<bool> {
        let n = self.num_subnets();
        let mut visited = vec![false; n];
        if n == 0 {
            return visited;
        }
        let mut queue = VecDeque::from([INTERNET_SUBNET]);
        visited[INTERNET_SUBNET] = true;

        while let Some(current) = queue.pop_front() {
            for next in 0..n {
                if !visited[next] && self.connected(current, next) {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    /// Fewest subnets outside `targets` that must be compromised so that
    /// every target subnet becomes reachable from the internet. Target
    /// subnets are free: they get compromised anyway.
    ///
    /// Minimum node-weighted Steiner arborescence rooted at the internet,
    /// solved with the Dreyfus-Wagner recurrence over subsets of `targets`.
    /// `None` if some target cannot be reached at all.
    pub fn min_stepping_stones(&self, targets: &[usize]) -> Option<usize> {
        let n = self.num_subnets();
        if targets.is_empty() {
            return Some(0);
        }
        if targets.iter().any(|&t| t >= n) {
            return None;
        }
        let weight = |v: usize| usize::from(v != INTERNET_SUBNET && !targets.contains(&v));

        // cost[set][v]: cheapest tree rooted at v reaching every target in
        // `set`, counting v itself
        let full = (1usize << targets.len()) - 1;
        let mut cost = vec![vec![UNREACHED; n]; full + 1];
        for (i, &target) in targets.iter().enumerate() {
            cost[1 << i][target] = 0;
        }

        for set in 1..=full {
            for v in 0..n {
                let mut sub = (set - 1) & set;
                while sub > 0 {
                    let (a, b) = (cost[sub][v], cost[set ^ sub][v]);
                    if a != UNREACHED && b != UNREACHED {
                        let merged = a + b - weight(v);
                        if merged < cost[set][v] {
                            cost[set][v] = merged;
                        }
                    }
                    sub = (sub - 1) & set;
                }
            }
            self.relax(&mut cost[set], weight);
        }

        let best = cost[full][INTERNET_SUBNET];
        (best != UNREACHED).then_some(best)
    }

    /// Dijkstra pass growing each tree upwards: a subnet `u` linked to `v`
    /// may become the new root at the price of `weight(u)`
    fn relax(&self, cost: &mut [usize], weight: impl Fn(usize) -> usize) {
        let mut heap: BinaryHeap<Reverse<(usize, usize)>> = cost
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != UNREACHED)
            .map(|(v, &c)| Reverse((c, v)))
            .collect();

        while let Some(Reverse((c, v))) = heap.pop() {
            if c > cost[v] {
                continue;
            }
            for u in 0..cost.len() {
                if u != v && self.connected(u, v) {
                    let next = c + weight(u);
                    if next < cost[u] {
                        cost[u] = next;
                        heap.push(Reverse((next, u)));
                    }
                }
            }
        }
    }
}
