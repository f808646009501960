use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, Removal};
use crate::domain::menu::MenuItemId;
use crate::domain::session::{SessionKey, UserId};
use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: MenuItemId,
    pub title: String,
    pub qty: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// What gets handed to the order sink at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProjection {
    /// Idempotency key; stays the same across submit retries.
    pub order_ref: String,
    pub tenant_id: TenantId,
    pub customer_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

impl OrderProjection {
    /// Returns `None` for an empty cart.
    pub fn from_cart(key: &SessionKey, cart: &Cart, now: DateTime<Utc>) -> Option<Self> {
        if cart.is_empty() {
            return None;
        }
        let lines = cart
            .lines
            .iter()
            .map(|line| OrderLine {
                item_id: line.item_id.clone(),
                title: line.title.clone(),
                qty: line.qty,
                unit_price: line.unit_price,
                subtotal: line.subtotal(),
            })
            .collect::<Vec<_>>();
        let total = lines.iter().map(|line| line.subtotal).sum();

        Some(Self {
            order_ref: uuid::Uuid::new_v4().to_string(),
            tenant_id: key.tenant_id.clone(),
            customer_id: key.user_id.clone(),
            lines,
            total,
            placed_at: now,
        })
    }

    /// Cart deltas that remove exactly what this order captured.
    pub fn removals(&self) -> Vec<Removal> {
        self.lines
            .iter()
            .map(|line| Removal { item_id: line.item_id.clone(), qty: line.qty })
            .collect()
    }
}
