use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use ordermate_core::domain::menu::{Menu, MenuItem, MenuItemId};
use ordermate_core::domain::tenant::{AssistantMode, TenantConfig, TenantId};
use ordermate_core::ports::{MenuProvider, PortError, TenantDirectory};

use super::{timestamp, RepositoryError};
use crate::DbPool;

/// Tenants and their menus.
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_tenant(&self, id: &TenantId) -> Result<Option<TenantConfig>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, display_name, currency_symbol, assistant_mode FROM tenant WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_tenant).transpose()
    }

    /// Available items in menu order. `None` when the tenant has no items.
    pub async fn find_menu(&self, id: &TenantId) -> Result<Option<Menu>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, price, tags_json, aliases_json
             FROM menu_item
             WHERE tenant_id = ? AND available = 1
             ORDER BY position, id",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let items = rows.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Menu::new(id.clone(), items)))
    }

    pub async fn save_tenant(&self, tenant: &TenantConfig) -> Result<(), RepositoryError> {
        let now = timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO tenant (id, display_name, currency_symbol, assistant_mode, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 currency_symbol = excluded.currency_symbol,
                 assistant_mode = excluded.assistant_mode,
                 updated_at = excluded.updated_at",
        )
        .bind(&tenant.tenant_id.0)
        .bind(&tenant.display_name)
        .bind(&tenant.currency_symbol)
        .bind(tenant.assistant_mode.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replaces the tenant's menu; item order becomes menu position.
    pub async fn replace_menu(&self, menu: &Menu) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM menu_item WHERE tenant_id = ?")
            .bind(&menu.tenant_id.0)
            .execute(&mut *tx)
            .await?;

        for (position, item) in menu.items.iter().enumerate() {
            let tags = serde_json::to_string(&item.tags)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let aliases = serde_json::to_string(&item.aliases)
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            sqlx::query(
                "INSERT INTO menu_item (tenant_id, id, title, price, tags_json, aliases_json, position, available)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
            )
            .bind(&menu.tenant_id.0)
            .bind(&item.id.0)
            .bind(&item.title)
            .bind(item.price.to_string())
            .bind(tags)
            .bind(aliases)
            .bind(position as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<TenantConfig, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let display_name: String =
        row.try_get("display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency_symbol: String =
        row.try_get("currency_symbol").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let mode: String =
        row.try_get("assistant_mode").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(TenantConfig {
        tenant_id: TenantId(id),
        display_name,
        currency_symbol,
        assistant_mode: AssistantMode::from_str(&mode).map_err(RepositoryError::Decode)?,
    })
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<MenuItem, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price: String = row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tags_json: String =
        row.try_get("tags_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let aliases_json: String =
        row.try_get("aliases_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(MenuItem {
        price: Decimal::from_str(&price)
            .map_err(|e| RepositoryError::Decode(format!("price of `{id}`: {e}")))?,
        tags: serde_json::from_str(&tags_json).map_err(|e| RepositoryError::Decode(e.to_string()))?,
        aliases: serde_json::from_str(&aliases_json)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        id: MenuItemId(id),
        title,
    })
}

#[async_trait::async_trait]
impl TenantDirectory for SqlCatalogRepository {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, PortError> {
        Ok(self.find_tenant(tenant_id).await?)
    }
}

#[async_trait::async_trait]
impl MenuProvider for SqlCatalogRepository {
    async fn get(&self, tenant_id: &TenantId) -> Result<Option<Menu>, PortError> {
        Ok(self.find_menu(tenant_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use ordermate_core::domain::menu::{Menu, MenuItem};
    use ordermate_core::domain::tenant::{AssistantMode, TenantConfig, TenantId};

    use super::SqlCatalogRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn catalog_round_trip_keeps_menu_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlCatalogRepository::new(pool);

        let mut tenant = TenantConfig::new("cafe", "Corner Cafe");
        tenant.assistant_mode = AssistantMode::DeterministicOnly;
        repo.save_tenant(&tenant).await.expect("save tenant");
        let menu = Menu::new(
            TenantId("cafe".to_string()),
            vec![
                MenuItem::new("latte", "Latte", Decimal::new(45050, 2)).with_tags(&["coffee"]),
                MenuItem::new("bagel", "Bagel", Decimal::new(300, 0)).with_aliases(&["plain bagel"]),
            ],
        );
        repo.replace_menu(&menu).await.expect("save menu");

        assert_eq!(repo.find_tenant(&tenant.tenant_id).await.expect("tenant"), Some(tenant.clone()));
        assert_eq!(repo.find_menu(&tenant.tenant_id).await.expect("menu"), Some(menu));
        assert_eq!(repo.find_menu(&TenantId("nowhere".to_string())).await.expect("menu"), None);
    }
}
