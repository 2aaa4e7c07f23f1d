//! Dependency resolution baton
//!
//! Carried down each recursive package load. The chain is copied on every
//! descent so sibling branches never see each other's in-flight packages;
//! the diagnostics collector is shared by the whole resolution.

use std::cell::RefCell;

use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};

#[derive(Debug)]
pub struct ResolveBaton<'a> {
    chain: Vec<String>,
    diagnostics: &'a RefCell<Diagnostics>,
}

impl<'a> ResolveBaton<'a> {
    pub fn new(diagnostics: &'a RefCell<Diagnostics>) -> Self {
        Self {
            chain: Vec::new(),
            diagnostics,
        }
    }

    /// Packages currently being loaded, outermost first.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// The package that asked for the current load, if any.
    pub fn requester(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }

    pub fn clone_for(&self, name: &str) -> ResolveBaton<'a> {
        let mut chain = self.chain.clone();
        chain.push(name.to_string());
        ResolveBaton {
            chain,
            diagnostics: self.diagnostics,
        }
    }

    pub fn check(&self, name: &str) -> Result<()> {
        if self.chain.iter().any(|c| c == name) {
            return Err(BuildError::CircularDependency {
                chain: self.chain.clone(),
                dependency: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn record(&self, diagnostics: &Diagnostics) {
        self.diagnostics.borrow_mut().merge(diagnostics.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Warning;

    #[test]
    fn test_check_detects_cycle() {
        let collector = RefCell::new(Diagnostics::new());
        let root = ResolveBaton::new(&collector);
        let b = root.clone_for("a.v1").clone_for("b.v1");

        assert!(b.check("c.v1").is_ok());
        match b.check("a.v1") {
            Err(BuildError::CircularDependency { chain, dependency }) => {
                assert_eq!(chain, vec!["a.v1", "b.v1"]);
                assert_eq!(dependency, "a.v1");
            }
            other => panic!("Expected circular dependency, got {:?}", other),
        }
    }

    #[test]
    fn test_siblings_do_not_share_chain() {
        let collector = RefCell::new(Diagnostics::new());
        let root = ResolveBaton::new(&collector).clone_for("a.v1");
        let left = root.clone_for("b.v1");
        let right = root.clone_for("c.v1");

        assert!(right.check("b.v1").is_ok());
        assert_eq!(left.chain(), ["a.v1", "b.v1"]);
        assert_eq!(right.requester(), Some("c.v1"));
    }

    #[test]
    fn test_collector_is_shared() {
        let collector = RefCell::new(Diagnostics::new());
        let root = ResolveBaton::new(&collector);
        let mut found = Diagnostics::new();
        found.warning(None, Warning::UnusedImport { package: "b.v1".into() });

        root.clone_for("a.v1").record(&found);
        root.clone_for("c.v1").record(&found);
        assert_eq!(collector.borrow().warning_count(), 2);
    }
}
