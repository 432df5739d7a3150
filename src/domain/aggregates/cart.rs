//! Guest cart aggregate
//!
//! Holds the invariants of a cart regardless of where it is persisted: at
//! most one line per product, quantities at least 1, subtotal recomputed on
//! every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{Money, Quantity};
use crate::ProductSnapshot;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GuestCart {
    session_id: String,
    items: Vec<CartLine>,
    subtotal: Money,
    currency: String,
    last_updated: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// One product-plus-quantity entry. The product fields are a snapshot taken
/// when the line was created, not a live reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub product: ProductSnapshot,
    pub quantity: Quantity,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.product.price.multiply(self.quantity.value()) }
}

impl GuestCart {
    pub fn for_session(session_id: impl Into<String>, currency: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(), items: vec![], subtotal: Money::zero(currency),
            currency: currency.to_string(), last_updated: now, events: vec![],
        }
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn last_updated(&self) -> DateTime<Utc> { self.last_updated }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize { self.items.len() }

    /// Sum of quantities across all lines, the header-badge count.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|l| l.quantity.value()).sum()
    }

    /// Adds a product, merging into the existing line for the same product id
    /// by summing quantities rather than duplicating.
    pub fn add_item(&mut self, line_id: String, product: ProductSnapshot, quantity: Quantity, now: DateTime<Utc>) {
        let product_id = product.id.clone();
        if let Some(existing) = self.items.iter_mut().find(|l| l.product.id == product.id) {
            existing.quantity = existing.quantity.add(quantity);
        } else {
            self.items.push(CartLine { id: line_id, product, quantity, added_at: now });
        }
        self.raise_event(DomainEvent::Cart(CartEvent::ItemAdded { product_id, quantity: quantity.value() }));
        self.recalculate(now);
    }

    /// Sets a line's quantity directly. Unknown product ids are reported so
    /// the caller can decide; quantities below 1 cannot be expressed here.
    pub fn update_quantity(&mut self, product_id: &str, quantity: Quantity, now: DateTime<Utc>) -> Result<(), CartError> {
        let line = self.items.iter_mut().find(|l| l.product.id == product_id).ok_or(CartError::ItemNotFound)?;
        line.quantity = quantity;
        self.raise_event(DomainEvent::Cart(CartEvent::QuantityUpdated { product_id: product_id.to_string(), quantity: quantity.value() }));
        self.recalculate(now);
        Ok(())
    }

    /// Removes a line. An absent product id is a no-op, not an error.
    pub fn remove_item(&mut self, product_id: &str, now: DateTime<Utc>) {
        let before = self.items.len();
        self.items.retain(|l| l.product.id != product_id);
        if self.items.len() != before {
            self.raise_event(DomainEvent::Cart(CartEvent::ItemRemoved { product_id: product_id.to_string() }));
            self.recalculate(now);
        }
    }

    /// Empties the cart, keeping the session binding.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.raise_event(DomainEvent::Cart(CartEvent::Cleared));
        self.recalculate(now);
    }

    fn recalculate(&mut self, now: DateTime<Utc>) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total()).unwrap_or(acc));
        self.last_updated = now;
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "item not found") }
}
