use sqlx::Executor;

use ordermate_core::domain::tenant::TenantId;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlCatalogRepository};

pub const DEMO_TENANT_ID: &str = "demo-bistro";

/// Expected menu rows: (item id, title, price).
const DEMO_MENU: &[(&str, &str, &str)] = &[
    ("truffle-melt-burger", "Truffle Melt Burger", "1850"),
    ("smoky-bbq-chicken", "Smoky BBQ Chicken", "1550"),
    ("loaded-fries", "Loaded Fries", "690"),
];

/// Demo tenant "Demo Burger Bistro" with a three-item menu, for local runs
/// and end-to-end tests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Idempotent: re-running updates the rows in place.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            tenant_id: DEMO_TENANT_ID,
            items_seeded: DEMO_MENU.iter().map(|(id, _, _)| *id).collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();
        let catalog = SqlCatalogRepository::new(pool.clone());
        let tenant_id = TenantId(DEMO_TENANT_ID.to_string());

        let tenant = catalog.find_tenant(&tenant_id).await?;
        checks.push((
            "demo-tenant",
            tenant.is_some_and(|tenant| tenant.display_name == "Demo Burger Bistro"),
        ));

        let menu = catalog.find_menu(&tenant_id).await?;
        let items = menu.map(|menu| menu.items).unwrap_or_default();
        checks.push(("demo-menu-size", items.len() == DEMO_MENU.len()));
        for (index, (id, title, price)) in DEMO_MENU.iter().enumerate() {
            let matches = items.get(index).is_some_and(|item| {
                item.id.0 == *id && item.title == *title && item.price.to_string() == *price
            });
            checks.push((*id, matches));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM menu_item WHERE tenant_id = ?")
            .bind(DEMO_TENANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_session WHERE tenant_id = ?")
            .bind(DEMO_TENANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM customer_order_line WHERE order_id IN
                 (SELECT id FROM customer_order WHERE tenant_id = ?)",
        )
        .bind(DEMO_TENANT_ID)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM customer_order WHERE tenant_id = ?")
            .bind(DEMO_TENANT_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tenant WHERE id = ?").bind(DEMO_TENANT_ID).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub tenant_id: &'static str,
    pub items_seeded: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(DemoSeedDataset::SQL.contains(DEMO_TENANT_ID));
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.items_seeded.len(), 3);

        DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification =
            DemoSeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert_eq!(first_verification.checks, second_verification.checks);

        DemoSeedDataset::clean(&pool).await.expect("clean");
        assert!(!DemoSeedDataset::verify(&pool).await.expect("verify after clean").all_present);
    }
}
