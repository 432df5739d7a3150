//! Domain events
//!
//! Raised by the cart and wishlist aggregates and drained by the stores,
//! which log them and notify subscribed UI.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Wishlist(WishlistEvent),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartEvent {
    ItemAdded { product_id: String, quantity: u32 },
    QuantityUpdated { product_id: String, quantity: u32 },
    ItemRemoved { product_id: String },
    Cleared,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WishlistEvent {
    Added { product_id: String },
    Removed { product_id: String },
    Cleared,
}
