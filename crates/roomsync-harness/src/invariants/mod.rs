//! Collection invariants.
//!
//! Every collection is checked on its own: a check sees one
//! [`CollectionState`] and either accepts it or explains what is wrong. The
//! [`InvariantRegistry`] runs every check over every collection in a
//! [`SystemSnapshot`] and labels each failure with the check and the
//! collection it came from.
//!
//! ```ignore
//! let state = CollectionState::from_engine(&engine).with_mirror(&mirror);
//! InvariantRegistry::standard().assert_all(&SystemSnapshot::single(state), "after page");
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    DisplayOrder, FirstUnreadConsistent, MirrorConsistent, UniqueIds, UnreadTotalConsistent,
};
pub use snapshot::{CollectionState, EntitySnapshot, SystemSnapshot};

/// Outcome of one check on one collection. The error explains the breach.
pub type InvariantResult = Result<(), String>;

/// A failed check, located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Check that failed.
    pub invariant: &'static str,
    /// Key of the offending collection.
    pub collection: String,
    /// What the check found.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.collection, self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property every synchronized collection must satisfy.
pub trait Invariant: Send + Sync {
    /// Short snake_case name used in reports.
    fn name(&self) -> &'static str;

    /// Check one collection.
    fn check(&self, collection: &CollectionState) -> InvariantResult;
}

/// Ordered set of checks.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry without checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniqueness, display order, derived unread state and observer mirrors.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UniqueIds);
        registry.add(DisplayOrder);
        registry.add(UnreadTotalConsistent);
        registry.add(FirstUnreadConsistent);
        registry.add(MirrorConsistent);
        registry
    }

    /// Append a check. Checks run in registration order.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.checks.push(Box::new(invariant));
    }

    /// Run every check on every collection.
    ///
    /// Failures are collected rather than stopping at the first, grouped by
    /// collection in snapshot order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> = state
            .collections
            .iter()
            .flat_map(|collection| {
                self.checks.iter().filter_map(move |check| {
                    check.check(collection).err().map(|message| Violation {
                        invariant: check.name(),
                        collection: collection.key.clone(),
                        message,
                    })
                })
            })
            .collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// [`check_all`](Self::check_all) for tests: panics listing every
    /// violation, prefixed with `context`.
    ///
    /// # Panics
    ///
    /// If any check fails.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let lines: Vec<String> = violations.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", lines.join("\n  "));
        }
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// True if no check is registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
