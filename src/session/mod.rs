//! Session identity provider
//!
//! Issues a stable anonymous identifier for guests and keeps a lightweight
//! session record next to it. Creation is idempotent: the first call writes
//! the id and the record exactly once, every later call is a read. When
//! storage is blocked the provider hands out a constant placeholder id so
//! guest features degrade to "no persistence" instead of failing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::platform::{read_json_or_default, write_json, Clock, IdGenerator, KeyValueStore};

pub const SESSION_ID_KEY: &str = "cart_session_id";
pub const SESSION_DATA_KEY: &str = "guest_session_data";

/// Identifier returned when persistent storage is unavailable.
pub const FALLBACK_SESSION_ID: &str = "guest-session-fallback";

const STALE_AFTER_DAYS: i64 = 30;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,
    pub device_info: DeviceInfo,
    pub preferences: Preferences,
}

/// Immutable snapshot taken when the session is created.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone: String,
}

/// Mutable, last-write-wins visitor preferences.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub currency: Option<String>,
    pub language: Option<String>,
    pub theme: Option<String>,
}

/// Partial update merged into [`Preferences`]; `None` fields are untouched.
#[derive(Clone, Debug, Default)]
pub struct PreferenceUpdate {
    pub currency: Option<String>,
    pub language: Option<String>,
    pub theme: Option<String>,
}

pub struct SessionProvider {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    device_info: DeviceInfo,
    // Cached id so repeat callers never race a second write.
    cached: Mutex<Option<String>>,
}

impl SessionProvider {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        device_info: DeviceInfo,
    ) -> Self {
        Self { store, ids, clock, device_info, cached: Mutex::new(None) }
    }

    /// Returns the stable session id, creating and persisting it on first
    /// access. Never errors: a blocked store yields [`FALLBACK_SESSION_ID`].
    pub fn session_id(&self) -> String {
        if let Ok(mut cached) = self.cached.lock() {
            if let Some(id) = cached.as_ref() {
                return id.clone();
            }
            let id = self.load_or_create();
            if id != FALLBACK_SESSION_ID {
                *cached = Some(id.clone());
            }
            return id;
        }
        FALLBACK_SESSION_ID.to_string()
    }

    fn load_or_create(&self) -> String {
        match self.store.get(SESSION_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => self.create(),
            Err(e) => {
                tracing::warn!(error = %e, "session storage unreadable, using fallback id");
                FALLBACK_SESSION_ID.to_string()
            }
        }
    }

    fn create(&self) -> String {
        let id = self.ids.generate();
        let now = self.clock.now();
        let record = SessionRecord {
            session_id: id.clone(),
            created_at: now,
            last_activity: now,
            device_info: self.device_info.clone(),
            preferences: Preferences::default(),
        };
        if let Err(e) = self.store.set(SESSION_ID_KEY, &id) {
            tracing::warn!(error = %e, "session id write failed, using fallback id");
            return FALLBACK_SESSION_ID.to_string();
        }
        if let Err(e) = write_json(self.store.as_ref(), SESSION_DATA_KEY, &record) {
            tracing::warn!(error = %e, "session record write failed");
        }
        tracing::debug!(session_id = %id, "guest session created");
        id
    }

    /// Current session record, if one was ever persisted.
    pub fn record(&self) -> Option<SessionRecord> {
        let record: SessionRecord = read_json_or_default(self.store.as_ref(), SESSION_DATA_KEY);
        if record.session_id.is_empty() { None } else { Some(record) }
    }

    /// Merges a partial preference update into the record, last write wins,
    /// and bumps `last_activity`. A missing record makes this a no-op.
    pub fn update_preferences(&self, update: PreferenceUpdate) {
        let Some(mut record) = self.record() else { return };
        if let Some(currency) = update.currency { record.preferences.currency = Some(currency); }
        if let Some(language) = update.language { record.preferences.language = Some(language); }
        if let Some(theme) = update.theme { record.preferences.theme = Some(theme); }
        record.last_activity = self.clock.now();
        if let Err(e) = write_json(self.store.as_ref(), SESSION_DATA_KEY, &record) {
            tracing::warn!(error = %e, "preference write failed");
        }
    }

    /// True when no record exists or the session was created more than 30
    /// days ago.
    pub fn is_stale(&self) -> bool {
        match self.record() {
            Some(record) => self.clock.now() - record.created_at > Duration::days(STALE_AFTER_DAYS),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{FailingStore, SequentialIds};
    use crate::platform::{FixedClock, MemoryStore};

    fn provider(store: Arc<dyn KeyValueStore>, clock: Arc<FixedClock>) -> SessionProvider {
        SessionProvider::new(store, Arc::new(SequentialIds::default()), clock, DeviceInfo::default())
    }

    #[test]
    fn test_session_id_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let p = provider(store, Arc::new(FixedClock::at_millis(0)));
        let first = p.session_id();
        for _ in 0..5 {
            assert_eq!(p.session_id(), first);
        }
    }

    #[test]
    fn test_first_call_writes_id_and_record() {
        let store = Arc::new(MemoryStore::new());
        let p = provider(store.clone(), Arc::new(FixedClock::at_millis(1_000)));
        let id = p.session_id();
        assert_eq!(store.get(SESSION_ID_KEY).unwrap().as_deref(), Some(id.as_str()));
        let record = p.record().unwrap();
        assert_eq!(record.session_id, id);
        assert_eq!(record.created_at.timestamp_millis(), 1_000);
    }

    #[test]
    fn test_storage_failure_falls_back() {
        let p = provider(Arc::new(FailingStore::default()), Arc::new(FixedClock::at_millis(0)));
        assert_eq!(p.session_id(), FALLBACK_SESSION_ID);
        // Still no crash on repeat calls.
        assert_eq!(p.session_id(), FALLBACK_SESSION_ID);
    }

    #[test]
    fn test_preference_merge_last_write_wins() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at_millis(0));
        let p = provider(store, clock.clone());
        p.session_id();
        p.update_preferences(PreferenceUpdate { currency: Some("KES".into()), ..Default::default() });
        clock.advance(500);
        p.update_preferences(PreferenceUpdate { currency: Some("USD".into()), theme: Some("dark".into()), ..Default::default() });
        let record = p.record().unwrap();
        assert_eq!(record.preferences.currency.as_deref(), Some("USD"));
        assert_eq!(record.preferences.theme.as_deref(), Some("dark"));
        assert_eq!(record.last_activity.timestamp_millis(), 500);
    }

    #[test]
    fn test_update_preferences_without_record_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let p = provider(store, Arc::new(FixedClock::at_millis(0)));
        p.update_preferences(PreferenceUpdate { theme: Some("dark".into()), ..Default::default() });
        assert!(p.record().is_none());
    }

    #[test]
    fn test_staleness_after_thirty_days() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at_millis(0));
        let p = provider(store, clock.clone());
        p.session_id();
        assert!(!p.is_stale());
        clock.advance(31 * 24 * 60 * 60 * 1000);
        assert!(p.is_stale());
    }

    #[test]
    fn test_no_record_is_stale() {
        let p = provider(Arc::new(MemoryStore::new()), Arc::new(FixedClock::at_millis(0)));
        assert!(p.is_stale());
    }
}
