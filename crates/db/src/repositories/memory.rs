use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use ordermate_core::domain::menu::Menu;
use ordermate_core::domain::order::{OrderId, OrderProjection};
use ordermate_core::domain::session::SessionKey;
use ordermate_core::domain::tenant::{TenantConfig, TenantId};
use ordermate_core::ports::{MenuProvider, OrderSink, PortError, TenantDirectory};

use super::{RepositoryError, SessionRepository, StoredSession};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionKey, StoredSession>>,
}

impl InMemorySessionRepository {
    /// Overwrites a row as-is, bypassing version checks.
    pub async fn put_raw(&self, key: SessionKey, stored: StoredSession) {
        self.sessions.write().await.insert(key, stored);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find(&self, key: &SessionKey) -> Result<Option<StoredSession>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(key).cloned())
    }

    async fn insert(
        &self,
        key: &SessionKey,
        state_json: &str,
        last_active: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return Ok(false);
        }
        sessions.insert(
            key.clone(),
            StoredSession { version: 1, state_json: state_json.to_string(), last_active },
        );
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &SessionKey,
        expected_version: i64,
        state_json: &str,
        last_active: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(key) {
            Some(stored) if stored.version == expected_version => {
                stored.version += 1;
                stored.state_json = state_json.to_string();
                stored.last_active = last_active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.last_active >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}

/// Tenants and menus held in memory.
#[derive(Default)]
pub struct InMemoryCatalog {
    tenants: RwLock<HashMap<TenantId, (TenantConfig, Menu)>>,
}

impl InMemoryCatalog {
    pub fn new(entries: Vec<(TenantConfig, Menu)>) -> Self {
        let tenants = entries
            .into_iter()
            .map(|(tenant, menu)| (tenant.tenant_id.clone(), (tenant, menu)))
            .collect();
        Self { tenants: RwLock::new(tenants) }
    }

    pub async fn insert(&self, tenant: TenantConfig, menu: Menu) {
        self.tenants.write().await.insert(tenant.tenant_id.clone(), (tenant, menu));
    }
}

#[async_trait::async_trait]
impl TenantDirectory for InMemoryCatalog {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, PortError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).map(|(tenant, _)| tenant.clone()))
    }
}

#[async_trait::async_trait]
impl MenuProvider for InMemoryCatalog {
    async fn get(&self, tenant_id: &TenantId) -> Result<Option<Menu>, PortError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).map(|(_, menu)| menu.clone()))
    }
}

/// Keyed by `order_ref`, so a resubmitted order maps to its first id.
#[derive(Default)]
pub struct InMemoryOrderSink {
    orders: RwLock<HashMap<String, (OrderId, OrderProjection)>>,
}

impl InMemoryOrderSink {
    pub async fn orders(&self) -> Vec<OrderProjection> {
        let orders = self.orders.read().await;
        let mut placed = orders.values().map(|(_, order)| order.clone()).collect::<Vec<_>>();
        placed.sort_by(|left, right| left.placed_at.cmp(&right.placed_at));
        placed
    }
}

#[async_trait::async_trait]
impl OrderSink for InMemoryOrderSink {
    async fn submit(&self, order: &OrderProjection) -> Result<OrderId, PortError> {
        let mut orders = self.orders.write().await;
        let next = orders.len() + 1;
        let (order_id, _) = orders
            .entry(order.order_ref.clone())
            .or_insert_with(|| (OrderId(format!("ORD-{next:05}")), order.clone()));
        Ok(order_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use ordermate_core::domain::cart::{Addition, Cart};
    use ordermate_core::domain::menu::{Menu, MenuItem};
    use ordermate_core::domain::order::OrderProjection;
    use ordermate_core::domain::session::SessionKey;
    use ordermate_core::domain::tenant::{TenantConfig, TenantId};
    use ordermate_core::ports::{MenuProvider, OrderSink, TenantDirectory};

    use super::{InMemoryCatalog, InMemoryOrderSink, InMemorySessionRepository};
    use crate::repositories::SessionRepository;

    #[tokio::test]
    async fn in_memory_session_cas_rejects_stale_versions() {
        let repo = InMemorySessionRepository::default();
        let key = SessionKey::new("bistro", "u1");
        let now = Utc::now();

        assert!(repo.insert(&key, "{}", now).await.expect("insert"));
        assert!(repo.compare_and_swap(&key, 1, "{}", now).await.expect("cas"));
        assert!(!repo.compare_and_swap(&key, 1, "{}", now).await.expect("stale cas"));
        assert_eq!(repo.find(&key).await.expect("find").map(|stored| stored.version), Some(2));
    }

    #[tokio::test]
    async fn in_memory_catalog_serves_known_tenants_only() {
        let menu = Menu::new(
            TenantId("bistro".to_string()),
            vec![MenuItem::new("fries", "Fries", Decimal::new(50, 0))],
        );
        let catalog = InMemoryCatalog::new(vec![(TenantConfig::new("bistro", "Bistro"), menu.clone())]);

        assert!(catalog.find(&TenantId("bistro".to_string())).await.expect("find").is_some());
        assert_eq!(catalog.get(&TenantId("bistro".to_string())).await.expect("menu"), Some(menu));
        assert!(catalog.find(&TenantId("elsewhere".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn in_memory_sink_is_idempotent_on_order_ref() {
        let sink = InMemoryOrderSink::default();
        let mut cart = Cart::default();
        cart.add(&Addition::from_item(&MenuItem::new("fries", "Fries", Decimal::new(50, 0)), 1));
        let order = OrderProjection::from_cart(&SessionKey::new("bistro", "u1"), &cart, Utc::now())
            .expect("order");

        let first = sink.submit(&order).await.expect("submit");
        let second = sink.submit(&order).await.expect("resubmit");

        assert_eq!(first, second);
        assert_eq!(sink.orders().await.len(), 1);
    }
}
