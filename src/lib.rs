//! WEGA Kitchenware Storefront Core
//!
//! Client-side state layer for the storefront UI: guest sessions, the cart
//! and wishlist, shipping cost resolution and the product carousel engine.
//! Persistence, pricing and auth live in a separate backend API; this crate
//! owns everything the browser keeps between requests.
//!
//! ## Features
//! - Stable anonymous guest sessions with preference metadata
//! - Guest cart and wishlist over origin-scoped key-value storage
//! - Reactive cart synchronization with optimistic updates and rollback
//! - Delivery-location shipping resolution and order totals
//! - Infinite-scroll carousel state machine with autoplay

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod carousel;
pub mod domain;
pub mod guest;
pub mod platform;
pub mod search;
pub mod session;
pub mod shipping;
pub mod sync;

pub use domain::aggregates::{CartLine, GuestCart, Wishlist, WishlistEntry};
pub use domain::value_objects::{Money, Quantity, Slug};
pub use guest::{LocalCartStore, LocalWishlistStore};
pub use session::{DeviceInfo, PreferenceUpdate, SessionProvider, SessionRecord};
pub use shipping::{DeliveryLocation, OrderTotals, ShippingResolver};
pub use sync::{CartBackend, CartHandle, CartView, GuestBackend};

use platform::StorageError;

/// Frozen copy of the external Product entity taken when an item enters the
/// cart or wishlist. Catalog changes after that point do not reprice lines.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub category: Option<String>,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("remote cart rejected the operation: {0}")]
    Remote(String),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("unknown delivery location: {0}")]
    LocationNotFound(String),

    #[error("delivery location is not selectable: {0}")]
    LocationInactive(String),

    #[error("no delivery location selected")]
    LocationUnselected,
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
