//! Synchronization tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Tunables for one synchronized collection.
///
/// Defaults mirror the behaviour of the mobile client: 50-entity pages, a two
/// second cooldown between older-page fetches, at most 100 unread entities
/// scanned for the initial anchor and older history prefetched when the
/// anchor sits within 20 sections of the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Entities requested per older page.
    pub page_size: usize,
    /// Minimum delay after a successful page before the next may be requested.
    pub pagination_cooldown: Duration,
    /// Positions scanned for a first-unread entity when picking the initial
    /// anchor. Past this limit the view opens at the latest entity.
    pub unread_scan_limit: usize,
    /// Anchors at or above this index also prefetch an older page.
    pub lookback_sections: usize,
    /// Buffered change notifications per observer before it lags.
    pub observer_capacity: usize,
    /// Persist the collection after every applied feed event instead of only
    /// after fresh fetches.
    ///
    /// The whole in-memory collection is stored, including entities that
    /// arrived through older pages, so a warm start shows the history the
    /// user had already paged in. The next fresh fetch replaces the record
    /// with the latest page again.
    pub write_through_events: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            pagination_cooldown: Duration::from_secs(2),
            unread_scan_limit: 100,
            lookback_sections: 20,
            observer_capacity: 256,
            write_through_events: false,
        }
    }
}

impl SyncConfig {
    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// - `SyncError::InvalidConfig` if `page_size` or `observer_capacity` is
    ///   zero.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.page_size == 0 {
            return Err(SyncError::InvalidConfig("page_size must be positive".into()));
        }
        if self.observer_capacity == 0 {
            return Err(SyncError::InvalidConfig("observer_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the pagination cooldown.
    #[must_use]
    pub fn with_pagination_cooldown(mut self, cooldown: Duration) -> Self {
        self.pagination_cooldown = cooldown;
        self
    }

    /// Enable or disable write-through of feed events.
    #[must_use]
    pub fn with_write_through_events(mut self, enabled: bool) -> Self {
        self.write_through_events = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pagination_cooldown, Duration::from_secs(2));
    }

    #[test]
    fn zero_page_size_rejected() {
        let config = SyncConfig::default().with_page_size(0);
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }
}
