use rust_decimal::Decimal;
use sqlx::Row;
use tracing::info;

use ordermate_core::domain::order::{OrderId, OrderProjection};
use ordermate_core::domain::tenant::TenantId;
use ordermate_core::ports::{OrderSink, PortError};

use super::{timestamp, RepositoryError};
use crate::DbPool;

/// Placed orders. A repeated `order_ref` resolves to the order already on
/// file, so submit retries never create a second order.
pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_ref(&self, order_ref: &str) -> Result<Option<OrderId>, RepositoryError> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM customer_order WHERE order_ref = ?")
                .bind(order_ref)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(OrderId))
    }

    pub async fn count_for_tenant(&self, tenant_id: &TenantId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM customer_order WHERE tenant_id = ?")
            .bind(&tenant_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn total_of(&self, order_id: &OrderId) -> Result<Option<Decimal>, RepositoryError> {
        let row = sqlx::query("SELECT total FROM customer_order WHERE id = ?")
            .bind(&order_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            let total: String =
                row.try_get("total").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            total.parse::<Decimal>().map_err(|e| RepositoryError::Decode(e.to_string()))
        })
        .transpose()
    }

    pub async fn record(&self, order: &OrderProjection) -> Result<OrderId, RepositoryError> {
        if let Some(existing) = self.find_by_ref(&order.order_ref).await? {
            return Ok(existing);
        }

        let order_id = OrderId(format!("ORD-{}", order.order_ref));
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO customer_order (id, order_ref, tenant_id, customer_id, total, status, placed_at)
             VALUES (?, ?, ?, ?, ?, 'placed', ?)
             ON CONFLICT(order_ref) DO NOTHING",
        )
        .bind(&order_id.0)
        .bind(&order.order_ref)
        .bind(&order.tenant_id.0)
        .bind(&order.customer_id.0)
        .bind(order.total.to_string())
        .bind(timestamp(order.placed_at))
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return self
                .find_by_ref(&order.order_ref)
                .await?
                .ok_or_else(|| RepositoryError::Decode(format!("order `{}` vanished", order.order_ref)));
        }

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO customer_order_line (order_id, line_no, item_id, title, qty, unit_price, subtotal)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&order_id.0)
            .bind(line_no as i64 + 1)
            .bind(&line.item_id.0)
            .bind(&line.title)
            .bind(i64::from(line.qty))
            .bind(line.unit_price.to_string())
            .bind(line.subtotal.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(
            event_name = "orders.recorded",
            order_id = %order_id.0,
            order_ref = %order.order_ref,
            tenant_id = %order.tenant_id,
            lines = order.lines.len(),
            "order recorded"
        );
        Ok(order_id)
    }
}

#[async_trait::async_trait]
impl OrderSink for SqlOrderRepository {
    async fn submit(&self, order: &OrderProjection) -> Result<OrderId, PortError> {
        Ok(self.record(order).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use ordermate_core::domain::cart::{Addition, Cart};
    use ordermate_core::domain::menu::MenuItem;
    use ordermate_core::domain::order::OrderProjection;
    use ordermate_core::domain::session::SessionKey;
    use ordermate_core::domain::tenant::TenantConfig;
    use ordermate_core::ports::OrderSink;

    use super::SqlOrderRepository;
    use crate::repositories::SqlCatalogRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn repeated_order_ref_is_one_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCatalogRepository::new(pool.clone())
            .save_tenant(&TenantConfig::new("bistro", "Bistro"))
            .await
            .expect("tenant");
        let repo = SqlOrderRepository::new(pool);

        let mut cart = Cart::default();
        cart.add(&Addition::from_item(&MenuItem::new("fries", "Fries", Decimal::new(50, 0)), 3));
        let order = OrderProjection::from_cart(&SessionKey::new("bistro", "u1"), &cart, Utc::now())
            .expect("non-empty cart");

        let first = repo.submit(&order).await.expect("first submit");
        let retry = repo.submit(&order).await.expect("retry");

        assert_eq!(first, retry);
        assert_eq!(repo.count_for_tenant(&order.tenant_id).await.expect("count"), 1);
        assert_eq!(repo.total_of(&first).await.expect("total"), Some(Decimal::new(150, 0)));
    }
}
