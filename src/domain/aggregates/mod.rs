//! Aggregates module
pub mod cart;
pub mod wishlist;

pub use cart::{CartError, CartLine, GuestCart};
pub use wishlist::{Wishlist, WishlistEntry};
