//! Wishlist aggregate
//!
//! Presence-only collection: entries carry no quantity and adding a product
//! twice leaves a single entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{DomainEvent, WishlistEvent};
use crate::ProductSnapshot;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Wishlist {
    session_id: String,
    entries: Vec<WishlistEntry>,
    last_updated: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: String,
    pub product: ProductSnapshot,
    pub added_at: DateTime<Utc>,
}

impl Wishlist {
    pub fn for_session(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { session_id: session_id.into(), entries: vec![], last_updated: now, events: vec![] }
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn entries(&self) -> &[WishlistEntry] { &self.entries }
    pub fn last_updated(&self) -> DateTime<Utc> { self.last_updated }
    pub fn count(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn contains(&self, product_id: &str) -> bool {
        self.entries.iter().any(|e| e.product.id == product_id)
    }

    /// Adds a product. A duplicate add is a no-op rather than a second entry.
    pub fn add(&mut self, entry_id: String, product: ProductSnapshot, now: DateTime<Utc>) {
        if self.contains(&product.id) {
            return;
        }
        let product_id = product.id.clone();
        self.entries.push(WishlistEntry { id: entry_id, product, added_at: now });
        self.raise_event(DomainEvent::Wishlist(WishlistEvent::Added { product_id }));
        self.last_updated = now;
    }

    /// Removes a product. An absent id is a no-op.
    pub fn remove(&mut self, product_id: &str, now: DateTime<Utc>) {
        let before = self.entries.len();
        self.entries.retain(|e| e.product.id != product_id);
        if self.entries.len() != before {
            self.raise_event(DomainEvent::Wishlist(WishlistEvent::Removed { product_id: product_id.to_string() }));
            self.last_updated = now;
        }
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.entries.clear();
        self.raise_event(DomainEvent::Wishlist(WishlistEvent::Cleared));
        self.last_updated = now;
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
