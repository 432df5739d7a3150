//! Delivery location and shipping cost resolver
//!
//! Maps the selected delivery location to a flat shipping price and derives
//! order totals. "No location selected" is a distinguished state: shipping
//! and total are `None`, never zero, and checkout stays blocked until a
//! location is chosen.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::domain::value_objects::{Money, Slug};
use crate::platform::KeyValueStore;
use crate::{Result, StorefrontError};

pub const SELECTED_LOCATION_KEY: &str = "selectedDeliveryLocation";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryLocation {
    pub id: String,
    pub name: String,
    pub slug: Slug,
    pub city: String,
    pub shipping_price: Money,
    pub is_active: bool,
}

/// Derived totals, never stored. `shipping` and `total` are `Some` exactly
/// when a location is selected, and `total = subtotal + shipping` then.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Option<Money>,
    pub total: Option<Money>,
}

impl OrderTotals {
    /// Checkout requires a resolved shipping price.
    pub fn can_checkout(&self) -> bool {
        self.total.is_some()
    }

    /// Total to charge at checkout; fails while no location is selected so
    /// the caller keeps the action disabled instead of charging subtotal.
    pub fn checkout_total(&self) -> Result<&Money> {
        self.total.as_ref().ok_or(StorefrontError::LocationUnselected)
    }
}

pub struct ShippingResolver {
    store: Arc<dyn KeyValueStore>,
    locations: Mutex<Vec<DeliveryLocation>>,
}

impl ShippingResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, locations: Mutex::new(vec![]) }
    }

    pub fn with_locations(store: Arc<dyn KeyValueStore>, locations: Vec<DeliveryLocation>) -> Self {
        Self { store, locations: Mutex::new(locations) }
    }

    /// Replaces the location list after a refetch. The persisted selection is
    /// left alone; it simply stops resolving if its slug is gone.
    pub fn set_locations(&self, locations: Vec<DeliveryLocation>) {
        if let Ok(mut current) = self.locations.lock() {
            *current = locations;
        }
    }

    /// Selects a location by slug and persists the choice in the session's
    /// storage scope. Unknown and inactive slugs are errors and leave the
    /// persisted selection untouched.
    pub fn select(&self, slug: &Slug) -> Result<DeliveryLocation> {
        let location = self
            .find(slug)
            .ok_or_else(|| StorefrontError::LocationNotFound(slug.to_string()))?;
        if !location.is_active {
            return Err(StorefrontError::LocationInactive(slug.to_string()));
        }
        if let Err(e) = self.store.set(SELECTED_LOCATION_KEY, slug.as_str()) {
            tracing::warn!(error = %e, "selected location persist failed");
        }
        Ok(location)
    }

    pub fn clear_selection(&self) {
        if let Err(e) = self.store.remove(SELECTED_LOCATION_KEY) {
            tracing::warn!(error = %e, "selected location clear failed");
        }
    }

    /// Persisted selection, if any. A malformed stored value reads as no
    /// selection.
    pub fn selected_slug(&self) -> Option<Slug> {
        match self.store.get(SELECTED_LOCATION_KEY) {
            Ok(Some(raw)) => Slug::new(raw).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "selected location read failed");
                None
            }
        }
    }

    /// Currently selected location resolved against the active list.
    pub fn selected(&self) -> Option<DeliveryLocation> {
        let slug = self.selected_slug()?;
        self.find(&slug).filter(|l| l.is_active)
    }

    /// Computes all three derived fields in one step so no caller can observe
    /// a subtotal from one cart state paired with shipping from another. A
    /// shipping price in another currency makes the location unresolvable
    /// (both fields `None`), keeping `total == subtotal + shipping` whenever
    /// a total exists.
    pub fn resolve(&self, subtotal: &Money) -> OrderTotals {
        let shipping = self.selected().map(|l| l.shipping_price);
        let (shipping, total) = match shipping {
            Some(s) => match subtotal.add(&s) {
                Ok(total) => (Some(s), Some(total)),
                Err(e) => {
                    tracing::warn!(error = %e, "shipping price not addable to subtotal, treating location as unresolved");
                    (None, None)
                }
            },
            None => (None, None),
        };
        OrderTotals { subtotal: subtotal.clone(), shipping, total }
    }

    fn find(&self, slug: &Slug) -> Option<DeliveryLocation> {
        self.locations
            .lock()
            .ok()?
            .iter()
            .find(|l| &l.slug == slug)
            .cloned()
    }
}
