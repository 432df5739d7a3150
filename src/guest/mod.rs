//! Guest cart and wishlist stores
//!
//! Key-value-backed collections scoped to a session id. The in-memory
//! aggregate is the working copy; every mutation is persisted best-effort,
//! and a failed write degrades the operation to in-memory only instead of
//! surfacing an error to the caller.

use std::sync::{Arc, Mutex};

use crate::domain::aggregates::{GuestCart, Wishlist};
use crate::domain::value_objects::Quantity;
use crate::platform::{read_json_or_default, write_json, Clock, IdGenerator, KeyValueStore};
use crate::ProductSnapshot;

pub fn cart_key(session_id: &str) -> String {
    format!("cart_items_{session_id}")
}

pub fn wishlist_key(session_id: &str) -> String {
    format!("wishlist_{session_id}")
}

pub struct LocalCartStore {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    key: String,
    cart: Mutex<GuestCart>,
}

impl LocalCartStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        session_id: &str,
        currency: &str,
    ) -> Self {
        let key = cart_key(session_id);
        let mut cart: GuestCart = read_json_or_default(store.as_ref(), &key);
        if cart.session_id().is_empty() {
            cart = GuestCart::for_session(session_id, currency, clock.now());
        }
        Self { store, ids, clock, key, cart: Mutex::new(cart) }
    }

    /// Current collection. Always well-formed and bound to the session, even
    /// when nothing was ever stored or the stored entry was unreadable.
    pub fn get_all(&self) -> GuestCart {
        self.with_cart(|cart| cart.clone())
    }

    pub fn count(&self) -> u32 {
        self.with_cart(|cart| cart.item_count())
    }

    pub fn add_item(&self, product: ProductSnapshot, quantity: u32) -> GuestCart {
        let Ok(quantity) = Quantity::new(quantity) else {
            tracing::warn!(product_id = %product.id, quantity, "rejected add with quantity below 1");
            return self.get_all();
        };
        self.mutate(|cart, ids, clock| {
            cart.add_item(ids.generate(), product, quantity, clock.now());
        })
    }

    /// Sets a line quantity directly. Values below 1 and unknown product ids
    /// leave the collection unchanged.
    pub fn update_quantity(&self, product_id: &str, new_quantity: u32) -> GuestCart {
        let Ok(quantity) = Quantity::new(new_quantity) else {
            tracing::warn!(product_id, new_quantity, "rejected quantity update below 1");
            return self.get_all();
        };
        self.mutate(|cart, _, clock| {
            if let Err(e) = cart.update_quantity(product_id, quantity, clock.now()) {
                tracing::warn!(product_id, error = %e, "quantity update skipped");
            }
        })
    }

    pub fn remove_item(&self, product_id: &str) -> GuestCart {
        self.mutate(|cart, _, clock| cart.remove_item(product_id, clock.now()))
    }

    pub fn clear(&self) -> GuestCart {
        self.mutate(|cart, _, clock| cart.clear(clock.now()))
    }

    fn with_cart<T>(&self, f: impl FnOnce(&GuestCart) -> T) -> T {
        match self.cart.lock() {
            Ok(cart) => f(&cart),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut GuestCart, &dyn IdGenerator, &dyn Clock)) -> GuestCart {
        let mut cart = match self.cart.lock() {
            Ok(cart) => cart,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut cart, self.ids.as_ref(), self.clock.as_ref());
        for event in cart.take_events() {
            tracing::debug!(?event, "cart event");
        }
        if let Err(e) = write_json(self.store.as_ref(), &self.key, &*cart) {
            tracing::warn!(error = %e, "cart persist failed, keeping in-memory state");
        }
        cart.clone()
    }
}

pub struct LocalWishlistStore {
    store: Arc<dyn KeyValueStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    key: String,
    wishlist: Mutex<Wishlist>,
}

impl LocalWishlistStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        session_id: &str,
    ) -> Self {
        let key = wishlist_key(session_id);
        let mut wishlist: Wishlist = read_json_or_default(store.as_ref(), &key);
        if wishlist.session_id().is_empty() {
            wishlist = Wishlist::for_session(session_id, clock.now());
        }
        Self { store, ids, clock, key, wishlist: Mutex::new(wishlist) }
    }

    pub fn get_all(&self) -> Wishlist {
        self.with_wishlist(|w| w.clone())
    }

    pub fn count(&self) -> usize {
        self.with_wishlist(|w| w.count())
    }

    pub fn is_in_wishlist(&self, product_id: &str) -> bool {
        self.with_wishlist(|w| w.contains(product_id))
    }

    /// Adds a product; a duplicate add is a no-op.
    pub fn add(&self, product: ProductSnapshot) -> Wishlist {
        self.mutate(|w, ids, clock| w.add(ids.generate(), product, clock.now()))
    }

    pub fn remove(&self, product_id: &str) -> Wishlist {
        self.mutate(|w, _, clock| w.remove(product_id, clock.now()))
    }

    /// Adds the product if absent, removes it if present.
    pub fn toggle(&self, product: ProductSnapshot) -> Wishlist {
        if self.is_in_wishlist(&product.id) {
            self.remove(&product.id)
        } else {
            self.add(product)
        }
    }

    pub fn clear(&self) -> Wishlist {
        self.mutate(|w, _, clock| w.clear(clock.now()))
    }

    fn with_wishlist<T>(&self, f: impl FnOnce(&Wishlist) -> T) -> T {
        match self.wishlist.lock() {
            Ok(w) => f(&w),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut Wishlist, &dyn IdGenerator, &dyn Clock)) -> Wishlist {
        let mut wishlist = match self.wishlist.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut wishlist, self.ids.as_ref(), self.clock.as_ref());
        for event in wishlist.take_events() {
            tracing::debug!(?event, "wishlist event");
        }
        if let Err(e) = write_json(self.store.as_ref(), &self.key, &*wishlist) {
            tracing::warn!(error = %e, "wishlist persist failed, keeping in-memory state");
        }
        wishlist.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Money;
    use crate::platform::testing::{FailingStore, SequentialIds};
    use crate::platform::{FixedClock, MemoryStore};
    use rust_decimal::Decimal;

    fn product(id: &str, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: id.into(), name: format!("Product {id}"), price: Money::kes(Decimal::new(price, 0)),
            image: None, category: None,
        }
    }

    fn cart_store(store: Arc<dyn KeyValueStore>) -> LocalCartStore {
        LocalCartStore::new(
            store,
            Arc::new(SequentialIds::default()),
            Arc::new(FixedClock::at_millis(0)),
            "s1",
            "KES",
        )
    }

    #[test]
    fn test_empty_collection_is_well_formed() {
        let cart = cart_store(Arc::new(MemoryStore::new())).get_all();
        assert_eq!(cart.session_id(), "s1");
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_repeated_adds_keep_one_line() {
        let cart_store = cart_store(Arc::new(MemoryStore::new()));
        cart_store.add_item(product("P1", 100), 1);
        cart_store.add_item(product("P1", 100), 2);
        let cart = cart_store.add_item(product("P1", 100), 3);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity.value(), 6);
    }

    #[test]
    fn test_quantity_below_one_is_rejected() {
        let cart_store = cart_store(Arc::new(MemoryStore::new()));
        cart_store.add_item(product("P1", 100), 2);
        let cart = cart_store.update_quantity("P1", 0);
        assert_eq!(cart.items()[0].quantity.value(), 2);
    }

    #[test]
    fn test_add_then_reload_survives() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        cart_store(store.clone()).add_item(product("7", 1000), 2);
        // Fresh store instance simulates a page reload.
        let cart = cart_store(store).get_all();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].product.id, "7");
        assert_eq!(cart.items()[0].quantity.value(), 2);
        assert_eq!(cart.subtotal().amount(), Decimal::new(2000, 0));
    }

    #[test]
    fn test_storage_failure_degrades_to_memory() {
        let cart_store = cart_store(Arc::new(FailingStore::default()));
        let cart = cart_store.add_item(product("P1", 100), 2);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity.value(), 2);
        // Later reads still see the in-memory state.
        assert_eq!(cart_store.count(), 2);
    }

    #[test]
    fn test_malformed_storage_falls_back_to_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(&cart_key("s1"), "{broken").unwrap();
        let cart = cart_store(store).get_all();
        assert!(cart.is_empty());
        assert_eq!(cart.session_id(), "s1");
    }

    #[test]
    fn test_wishlist_duplicate_add() {
        let store = LocalWishlistStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SequentialIds::default()),
            Arc::new(FixedClock::at_millis(0)),
            "s1",
        );
        store.add(product("P1", 100));
        let wishlist = store.add(product("P1", 100));
        assert_eq!(wishlist.count(), 1);
        assert!(store.is_in_wishlist("P1"));
    }

    #[test]
    fn test_wishlist_toggle() {
        let store = LocalWishlistStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SequentialIds::default()),
            Arc::new(FixedClock::at_millis(0)),
            "s1",
        );
        store.toggle(product("P1", 100));
        assert!(store.is_in_wishlist("P1"));
        store.toggle(product("P1", 100));
        assert!(!store.is_in_wishlist("P1"));
    }
}
