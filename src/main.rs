//! WEGA Storefront - guest flow walkthrough
//!
//! Drives the core state layer end to end against a JSON file store: session
//! creation, cart mutations, wishlist toggles, shipping selection and totals.
//! Run it twice to see the guest state survive a restart.

use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wega_storefront::platform::{FileStore, SystemClock, UuidGenerator};
use wega_storefront::shipping::DeliveryLocation;
use wega_storefront::{
    CartHandle, DeviceInfo, GuestBackend, LocalCartStore, LocalWishlistStore, Money,
    PreferenceUpdate, ProductSnapshot, SessionProvider, ShippingResolver, Slug,
};

fn product(id: &str, name: &str, price: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: id.into(),
        name: name.into(),
        price: Money::kes(Decimal::new(price, 0)),
        image: None,
        category: Some("cookware".into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state_path = std::env::var("WEGA_STATE_PATH").unwrap_or_else(|_| "wega-state.json".to_string());
    let store = Arc::new(FileStore::open(&state_path));
    let ids = Arc::new(UuidGenerator);
    let clock = Arc::new(SystemClock);

    let sessions = SessionProvider::new(
        store.clone(),
        ids.clone(),
        clock.clone(),
        DeviceInfo { user_agent: "wega-storefront-demo".into(), screen_width: 1440, screen_height: 900, timezone: "Africa/Nairobi".into() },
    );
    let session_id = sessions.session_id();
    sessions.update_preferences(PreferenceUpdate { currency: Some("KES".into()), ..Default::default() });
    tracing::info!(%session_id, stale = sessions.is_stale(), path = %state_path, "guest session ready");

    let cart_store = Arc::new(LocalCartStore::new(store.clone(), ids.clone(), clock.clone(), &session_id, "KES"));
    let wishlist = LocalWishlistStore::new(store.clone(), ids.clone(), clock.clone(), &session_id);
    let cart = CartHandle::new(Arc::new(GuestBackend::new(cart_store)), clock).await?;

    cart.add_to_cart(product("wega-001", "Granite Frying Pan 28cm", 2450), 1).await?;
    cart.add_to_cart(product("wega-002", "6pc Knife Set", 3200), 2).await?;
    cart.add_to_cart(product("wega-001", "Granite Frying Pan 28cm", 2450), 1).await?;
    wishlist.toggle(product("wega-009", "Cast Iron Dutch Oven", 5900));

    let view = cart.view();
    tracing::info!(lines = view.items.len(), count = view.cart_count, subtotal = %view.subtotal.amount(), wishlist = wishlist.count(), "cart state");

    let resolver = ShippingResolver::with_locations(
        store,
        vec![
            DeliveryLocation { id: "1".into(), name: "Nairobi CBD".into(), slug: Slug::new("nairobi-cbd")?, city: "Nairobi".into(), shipping_price: Money::kes(Decimal::new(250, 0)), is_active: true },
            DeliveryLocation { id: "2".into(), name: "Westlands".into(), slug: Slug::new("westlands")?, city: "Nairobi".into(), shipping_price: Money::kes(Decimal::new(350, 0)), is_active: true },
        ],
    );

    let before = resolver.resolve(&view.subtotal);
    tracing::info!(can_checkout = before.can_checkout(), "before location selection");

    resolver.select(&Slug::new("nairobi-cbd")?)?;
    let totals = resolver.resolve(&view.subtotal);
    tracing::info!(
        subtotal = %totals.subtotal.amount(),
        shipping = %totals.shipping.as_ref().map(|m| m.amount().to_string()).unwrap_or_default(),
        total = %totals.checkout_total()?.amount(),
        "order totals"
    );

    Ok(())
}
