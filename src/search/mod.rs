//! Recent searches and suggestion debouncing
//!
//! Small helpers behind the header search box: a bounded most-recent-first
//! history persisted in the session's storage scope, and a timestamp-based
//! debounce gate for suggestion lookups so a keystroke burst results in one
//! request. The gate holds no timer; teardown is just dropping it.

use std::sync::Arc;

use crate::platform::{read_json_or_default, write_json, KeyValueStore};

pub const RECENT_SEARCHES_KEY: &str = "recentSearches";

const MAX_RECENT: usize = 10;

pub struct RecentSearches {
    store: Arc<dyn KeyValueStore>,
}

impl RecentSearches {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Most recent first. Malformed or missing storage reads as empty.
    pub fn list(&self) -> Vec<String> {
        read_json_or_default(self.store.as_ref(), RECENT_SEARCHES_KEY)
    }

    /// Records a term, deduplicating case-insensitively and capping at 10.
    /// Blank terms are ignored.
    pub fn push(&self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let mut terms = self.list();
        terms.retain(|t| !t.eq_ignore_ascii_case(term));
        terms.insert(0, term.to_string());
        terms.truncate(MAX_RECENT);
        if let Err(e) = write_json(self.store.as_ref(), RECENT_SEARCHES_KEY, &terms) {
            tracing::warn!(error = %e, "recent searches persist failed");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(RECENT_SEARCHES_KEY) {
            tracing::warn!(error = %e, "recent searches clear failed");
        }
    }
}

/// Debounce gate for suggestion lookups. The host records keystrokes and
/// polls `due`; a pending fire is dropped by `cancel` on component teardown.
#[derive(Debug)]
pub struct DebounceGate {
    delay_ms: i64,
    pending_since_ms: Option<i64>,
}

impl DebounceGate {
    pub fn new(delay_ms: i64) -> Self {
        Self { delay_ms, pending_since_ms: None }
    }

    pub fn keystroke(&mut self, now_ms: i64) {
        self.pending_since_ms = Some(now_ms);
    }

    /// True exactly once per quiet period after the delay has elapsed.
    pub fn due(&mut self, now_ms: i64) -> bool {
        match self.pending_since_ms {
            Some(since) if now_ms - since >= self.delay_ms => {
                self.pending_since_ms = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.pending_since_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryStore;

    #[test]
    fn test_recent_searches_dedupe_and_cap() {
        let searches = RecentSearches::new(Arc::new(MemoryStore::new()));
        for i in 0..12 {
            searches.push(&format!("pan {i}"));
        }
        searches.push("PAN 11");
        let terms = searches.list();
        assert_eq!(terms.len(), 10);
        assert_eq!(terms[0], "PAN 11");
        assert_eq!(terms.iter().filter(|t| t.eq_ignore_ascii_case("pan 11")).count(), 1);
    }

    #[test]
    fn test_blank_terms_ignored() {
        let searches = RecentSearches::new(Arc::new(MemoryStore::new()));
        searches.push("   ");
        assert!(searches.list().is_empty());
    }

    #[test]
    fn test_debounce_fires_once_after_quiet_period() {
        let mut gate = DebounceGate::new(300);
        gate.keystroke(0);
        gate.keystroke(100);
        assert!(!gate.due(200));
        assert!(!gate.due(350));
        assert!(gate.due(400));
        assert!(!gate.due(500), "fires once per quiet period");
    }

    #[test]
    fn test_cancel_drops_pending_fire() {
        let mut gate = DebounceGate::new(300);
        gate.keystroke(0);
        gate.cancel();
        assert!(!gate.due(1_000));
    }
}
