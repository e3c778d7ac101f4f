//! Firewall rule table.

use crate::scenario::ServiceId;
use std::collections::{BTreeMap, BTreeSet};

/// Permitted services per `(src, dst)` subnet pair. Pairs with no rule permit
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Firewall {
    rules: BTreeMap<(usize, usize), BTreeSet<ServiceId>>,
}

impl Firewall {
    pub fn new(rules: BTreeMap<(usize, usize), BTreeSet<ServiceId>>) -> Self {
        Self { rules }
    }

    pub fn permits(&self, src: usize, dst: usize, service: ServiceId) -> bool {
        self.rules
            .get(&(src, dst))
            .map_or(false, |permitted| permitted.contains(&service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits() {
        let firewall = Firewall::new(BTreeMap::from([((0, 1), BTreeSet::from([2, 3]))]));
        assert!(firewall.permits(0, 1, 2));
        assert!(!firewall.permits(0, 1, 0));
        assert!(!firewall.permits(1, 0, 2));
        assert!(firewall.permits(0, 1, 3));
        assert!(!firewall.permits(2, 1, 2));
    }
}
