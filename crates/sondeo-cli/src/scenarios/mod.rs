//! Bundled scenario suites.
//!
//! Each suite comes with a replica site so it can run on the mock engine
//! without network access.

pub mod signin;

use sondeo::{MockSite, TestSuite};

/// Suites shipped with the binary, by name
#[must_use]
pub fn bundled() -> Vec<TestSuite> {
    vec![signin::suite()]
}

/// Find a bundled suite by name
#[must_use]
pub fn find(name: &str) -> Option<TestSuite> {
    bundled().into_iter().find(|s| s.name() == name)
}

/// Replica of every page the bundled suites visit
#[must_use]
pub fn replica_site() -> MockSite {
    signin::replica_site()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_suite() {
        assert!(find(signin::SUITE_NAME).is_some());
        assert!(find("nope").is_none());
    }
}
