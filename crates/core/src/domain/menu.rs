use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MenuItemId(pub String);

impl fmt::Display for MenuItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl MenuItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: MenuItemId(id.into()),
            title: title.into(),
            price,
            tags: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| (*tag).to_string()).collect();
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|alias| (*alias).to_string()).collect();
        self
    }
}

/// Read-only, tenant-scoped menu snapshot. Fetched once per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub tenant_id: TenantId,
    pub items: Vec<MenuItem>,
}

impl Menu {
    pub fn new(tenant_id: TenantId, items: Vec<MenuItem>) -> Self {
        Self { tenant_id, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &MenuItemId) -> Option<&MenuItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Exact (case-insensitive) title or alias lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&MenuItem> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.items.iter().find(|item| item.title.to_lowercase() == needle).or_else(|| {
            self.items
                .iter()
                .find(|item| item.aliases.iter().any(|alias| alias.to_lowercase() == needle))
        })
    }

    /// Distinct tags in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for tag in self.items.iter().flat_map(|item| item.tags.iter()) {
            let tag = tag.to_lowercase();
            if !categories.contains(&tag) {
                categories.push(tag);
            }
        }
        categories
    }
}
