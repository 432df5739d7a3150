//! Cart synchronization hook
//!
//! One reactive view of "the current cart" regardless of backend: the local
//! guest store, or a remote API once the visitor authenticates. Mutations are
//! serialized, applied optimistically, and rolled back when the backend
//! rejects them; subscribers always observe recomputed aggregates before a
//! mutation future resolves.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::domain::aggregates::{CartLine, GuestCart};
use crate::domain::value_objects::{Money, Quantity};
use crate::guest::LocalCartStore;
use crate::platform::Clock;
use crate::{ProductSnapshot, Result, StorefrontError};

/// Derived snapshot pushed to subscribed UI (cart page, modal, header badge).
#[derive(Clone, Debug, Default)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub cart_count: u32,
    pub subtotal: Money,
}

impl From<&GuestCart> for CartView {
    fn from(cart: &GuestCart) -> Self {
        Self {
            items: cart.items().to_vec(),
            cart_count: cart.item_count(),
            subtotal: cart.subtotal().clone(),
        }
    }
}

/// The authoritative cart for one visitor. Implemented by [`GuestBackend`]
/// over local storage and, outside this crate, by the remote REST API client
/// for authenticated users. Every mutation returns the updated collection.
#[async_trait]
pub trait CartBackend: Send + Sync {
    async fn fetch(&self) -> Result<GuestCart>;
    async fn add_item(&self, product: ProductSnapshot, quantity: u32) -> Result<GuestCart>;
    async fn update_quantity(&self, product_id: &str, quantity: u32) -> Result<GuestCart>;
    async fn remove_item(&self, product_id: &str) -> Result<GuestCart>;
    async fn clear(&self) -> Result<GuestCart>;
}

/// Guest backend: adapts the synchronous local store. Storage failures were
/// already degraded inside the store, so these operations cannot reject.
pub struct GuestBackend {
    store: Arc<LocalCartStore>,
}

impl GuestBackend {
    pub fn new(store: Arc<LocalCartStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CartBackend for GuestBackend {
    async fn fetch(&self) -> Result<GuestCart> {
        Ok(self.store.get_all())
    }

    async fn add_item(&self, product: ProductSnapshot, quantity: u32) -> Result<GuestCart> {
        Ok(self.store.add_item(product, quantity))
    }

    async fn update_quantity(&self, product_id: &str, quantity: u32) -> Result<GuestCart> {
        Ok(self.store.update_quantity(product_id, quantity))
    }

    async fn remove_item(&self, product_id: &str) -> Result<GuestCart> {
        Ok(self.store.remove_item(product_id))
    }

    async fn clear(&self) -> Result<GuestCart> {
        Ok(self.store.clear())
    }
}

/// The hook itself. Sole arbiter of which backend is authoritative; nothing
/// else writes to the guest cart while a handle is live.
pub struct CartHandle {
    backend: Mutex<Arc<dyn CartBackend>>,
    clock: Arc<dyn Clock>,
    // Held across the backend await so rapid mutations apply in order
    // instead of racing the same key.
    mutation: Mutex<()>,
    // Last authoritative collection, the rollback snapshot.
    latest: std::sync::Mutex<GuestCart>,
    tx: watch::Sender<CartView>,
}

impl CartHandle {
    /// Seeds the subscriber channel with the backend's current state.
    pub async fn new(backend: Arc<dyn CartBackend>, clock: Arc<dyn Clock>) -> Result<Self> {
        let initial = backend.fetch().await?;
        let (tx, _) = watch::channel(CartView::from(&initial));
        Ok(Self {
            backend: Mutex::new(backend),
            clock,
            mutation: Mutex::new(()),
            latest: std::sync::Mutex::new(initial),
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.tx.subscribe()
    }

    pub fn view(&self) -> CartView {
        self.tx.borrow().clone()
    }

    pub async fn add_to_cart(&self, product: ProductSnapshot, quantity: u32) -> Result<CartView> {
        let Ok(valid) = Quantity::new(quantity) else {
            return Err(StorefrontError::InvalidQuantity);
        };
        let _guard = self.mutation.lock().await;
        let backend = self.current_backend().await;
        let now = self.clock.now();
        self.run_optimistic(
            |cart| {
                let line_id = format!("pending-{}", product.id);
                cart.add_item(line_id, product.clone(), valid, now);
            },
            backend.add_item(product.clone(), quantity),
        )
        .await
    }

    pub async fn update_quantity(&self, product_id: &str, quantity: u32) -> Result<CartView> {
        let Ok(valid) = Quantity::new(quantity) else {
            return Err(StorefrontError::InvalidQuantity);
        };
        let _guard = self.mutation.lock().await;
        let backend = self.current_backend().await;
        let now = self.clock.now();
        self.run_optimistic(
            |cart| {
                let _ = cart.update_quantity(product_id, valid, now);
            },
            backend.update_quantity(product_id, quantity),
        )
        .await
    }

    pub async fn remove_from_cart(&self, product_id: &str) -> Result<CartView> {
        let _guard = self.mutation.lock().await;
        let backend = self.current_backend().await;
        let now = self.clock.now();
        self.run_optimistic(
            |cart| cart.remove_item(product_id, now),
            backend.remove_item(product_id),
        )
        .await
    }

    pub async fn clear_cart(&self) -> Result<CartView> {
        let _guard = self.mutation.lock().await;
        let backend = self.current_backend().await;
        let now = self.clock.now();
        self.run_optimistic(|cart| cart.clear(now), backend.clear()).await
    }

    /// Switches the authoritative backend, merging the current items into it
    /// by replaying them through `add_item` (which sums quantities per
    /// product). Used when a guest with a populated cart signs in.
    ///
    /// Each line leaves the old backend only once its replay succeeded, so an
    /// interrupted merge resumes from the remaining lines on retry instead of
    /// double-counting the ones already transferred.
    pub async fn adopt_backend(&self, new_backend: Arc<dyn CartBackend>) -> Result<CartView> {
        let _guard = self.mutation.lock().await;
        let old_backend = self.current_backend().await;
        let current = old_backend.fetch().await?;

        let mut merged = new_backend.fetch().await?;
        for line in current.items() {
            match new_backend.add_item(line.product.clone(), line.quantity.value()).await {
                Ok(cart) => {
                    merged = cart;
                    old_backend.remove_item(&line.product.id).await?;
                }
                Err(e) => {
                    tracing::warn!(product_id = %line.product.id, error = %e, "cart merge interrupted, keeping unmerged lines");
                    let remaining = old_backend.fetch().await?;
                    self.publish(CartView::from(&remaining));
                    self.set_latest(remaining);
                    return Err(e);
                }
            }
        }
        old_backend.clear().await?;

        let mut backend = self.backend.lock().await;
        *backend = new_backend;
        let view = CartView::from(&merged);
        self.set_latest(merged);
        self.publish(view.clone());
        Ok(view)
    }

    async fn current_backend(&self) -> Arc<dyn CartBackend> {
        self.backend.lock().await.clone()
    }

    /// Optimistic mutation: project the change onto the last authoritative
    /// collection and show it immediately, then replace it with the backend's
    /// answer, or roll back and surface the rejection.
    async fn run_optimistic(
        &self,
        project: impl FnOnce(&mut GuestCart),
        remote: impl std::future::Future<Output = Result<GuestCart>>,
    ) -> Result<CartView> {
        let prior = self.snapshot();
        let mut projected = prior.clone();
        project(&mut projected);
        projected.take_events();
        self.publish(CartView::from(&projected));

        match remote.await {
            Ok(cart) => {
                let view = CartView::from(&cart);
                self.set_latest(cart);
                self.publish(view.clone());
                Ok(view)
            }
            Err(e) => {
                tracing::warn!(error = %e, "cart mutation rejected, rolling back");
                self.publish(CartView::from(&prior));
                Err(e)
            }
        }
    }

    fn snapshot(&self) -> GuestCart {
        match self.latest.lock() {
            Ok(cart) => cart.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_latest(&self, cart: GuestCart) {
        match self.latest.lock() {
            Ok(mut latest) => *latest = cart,
            Err(poisoned) => *poisoned.into_inner() = cart,
        }
    }

    fn publish(&self, view: CartView) {
        // send_replace stores the value even with no live receivers, so
        // view() and late subscribers always see the latest state.
        self.tx.send_replace(view);
    }
}
