use std::sync::Arc;

use chrono::{Duration, Utc};

use ordermate_core::domain::cart::Addition;
use ordermate_core::domain::order::OrderProjection;
use ordermate_core::domain::session::{Message, Session, SessionKey};
use ordermate_core::domain::tenant::TenantId;
use ordermate_core::ports::{MenuProvider, OrderSink, SessionStore, TenantDirectory};
use ordermate_db::fixtures::DEMO_TENANT_ID;
use ordermate_db::repositories::{SqlCatalogRepository, SqlOrderRepository};
use ordermate_db::{connect_with_settings, migrations, DbPool, DemoSeedDataset, VersionedSessionStore};

async fn seeded_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");
    pool
}

#[tokio::test]
async fn seeded_catalog_serves_the_demo_menu() {
    let catalog = SqlCatalogRepository::new(seeded_pool().await);
    let tenant_id = TenantId(DEMO_TENANT_ID.to_string());

    let tenant = catalog.find(&tenant_id).await.expect("tenant lookup").expect("tenant");
    let menu = catalog.get(&tenant_id).await.expect("menu lookup").expect("menu");

    assert_eq!(tenant.display_name, "Demo Burger Bistro");
    assert!(tenant.model_permitted());
    let titles = menu.items.iter().map(|item| item.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, ["Truffle Melt Burger", "Smoky BBQ Chicken", "Loaded Fries"]);
    assert!(menu.find_by_name("bbq chicken").is_some());
}

#[tokio::test]
async fn stores_sharing_a_database_never_lose_a_turn() {
    let pool = seeded_pool().await;
    let first = Arc::new(VersionedSessionStore::sqlite(pool.clone(), Duration::minutes(10)));
    let second = Arc::new(VersionedSessionStore::sqlite(pool.clone(), Duration::minutes(10)));
    let menu = SqlCatalogRepository::new(pool)
        .get(&TenantId(DEMO_TENANT_ID.to_string()))
        .await
        .expect("menu lookup")
        .expect("menu");
    let fries = Addition::from_item(&menu.items[2], 1);
    let key = SessionKey::new(DEMO_TENANT_ID, "u1");

    let mut handles = Vec::new();
    for turn in 0..6 {
        let store = if turn % 2 == 0 { first.clone() } else { second.clone() };
        let key = key.clone();
        let fries = fries.clone();
        handles.push(tokio::spawn(async move {
            let apply = move |session: &mut Session| {
                session.cart.add(&fries);
                session.history.push(Message::user(format!("turn {turn}")));
            };
            store.save(&key, &apply).await.map(|_| ())
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("save");
    }

    let session = first.load(&key).await;
    assert_eq!(session.cart.item_count(), 6);
    assert_eq!(session.history.len(), 6);
}

#[tokio::test]
async fn checkout_orders_persist_once_per_ref() {
    let pool = seeded_pool().await;
    let menu = SqlCatalogRepository::new(pool.clone())
        .get(&TenantId(DEMO_TENANT_ID.to_string()))
        .await
        .expect("menu lookup")
        .expect("menu");
    let orders = SqlOrderRepository::new(pool);
    let mut session = Session::new(SessionKey::new(DEMO_TENANT_ID, "u1"), Utc::now());
    session.cart.add(&Addition::from_item(&menu.items[0], 2));
    session.cart.add(&Addition::from_item(&menu.items[2], 1));
    let order =
        OrderProjection::from_cart(&session.key, &session.cart, Utc::now()).expect("order");

    let placed = orders.submit(&order).await.expect("submit");
    let again = orders.submit(&order).await.expect("resubmit");

    assert_eq!(placed, again);
    assert_eq!(orders.count_for_tenant(&order.tenant_id).await.expect("count"), 1);
    assert_eq!(
        orders.total_of(&placed).await.expect("total"),
        Some(rust_decimal::Decimal::new(4390, 0))
    );
}
