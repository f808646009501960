use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::menu::{MenuItem, MenuItemId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: MenuItemId,
    pub title: String,
    pub qty: u32,
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.qty)
    }
}

/// A resolved request to add `qty` of one menu item. The price is captured
/// when the addition is resolved so replaying it never consults the menu.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addition {
    pub item_id: MenuItemId,
    pub title: String,
    pub unit_price: Decimal,
    pub qty: u32,
}

impl Addition {
    pub fn from_item(item: &MenuItem, qty: u32) -> Self {
        Self { item_id: item.id.clone(), title: item.title.clone(), unit_price: item.price, qty }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub item_id: MenuItemId,
    pub qty: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Merges into the existing line for the item or appends a new one.
    /// The unit price of an existing line never changes.
    pub fn add(&mut self, addition: &Addition) {
        if addition.qty == 0 {
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|line| line.item_id == addition.item_id) {
            line.qty = line.qty.saturating_add(addition.qty);
            return;
        }
        self.lines.push(CartLine {
            item_id: addition.item_id.clone(),
            title: addition.title.clone(),
            qty: addition.qty,
            unit_price: addition.unit_price,
        });
    }

    pub fn remove_quantity(&mut self, removal: &Removal) {
        if let Some(line) = self.lines.iter_mut().find(|line| line.item_id == removal.item_id) {
            line.qty = line.qty.saturating_sub(removal.qty);
        }
        self.lines.retain(|line| line.qty > 0);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, item_id: &MenuItemId) -> u32 {
        self.lines.iter().find(|line| &line.item_id == item_id).map_or(0, |line| line.qty)
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().fold(0u32, |count, line| count.saturating_add(line.qty))
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// `2 x Burger, 1 x Fries`
    pub fn describe(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{} x {}", line.qty, line.title))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            item_count: self.item_count(),
            lines: self
                .lines
                .iter()
                .map(|line| SnapshotLine { title: line.title.clone(), qty: line.qty })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub item_count: u32,
    pub lines: Vec<SnapshotLine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub title: String,
    pub qty: u32,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Addition, Cart, Removal};
    use crate::domain::menu::{MenuItem, MenuItemId};

    fn burger() -> MenuItem {
        MenuItem::new("burger", "Burger", Decimal::new(100, 0))
    }

    fn fries() -> MenuItem {
        MenuItem::new("fries", "Fries", Decimal::new(50, 0))
    }

    #[test]
    fn repeated_additions_merge_into_one_line() {
        let mut cart = Cart::default();
        for qty in [2, 3, 1] {
            cart.add(&Addition::from_item(&burger(), qty));
        }
        cart.add(&Addition::from_item(&fries(), 1));

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.quantity_of(&MenuItemId("burger".to_string())), 6);
        assert_eq!(cart.item_count(), 7);
        assert_eq!(cart.total(), Decimal::new(650, 0));
    }

    #[test]
    fn unit_price_is_pinned_at_first_add() {
        let mut cart = Cart::default();
        cart.add(&Addition::from_item(&burger(), 1));

        let repriced = MenuItem { price: Decimal::new(999, 0), ..burger() };
        cart.add(&Addition::from_item(&repriced, 1));

        assert_eq!(cart.lines[0].unit_price, Decimal::new(100, 0));
        assert_eq!(cart.total(), Decimal::new(200, 0));
    }

    #[test]
    fn zero_quantity_is_ignored() {
        let mut cart = Cart::default();
        cart.add(&Addition::from_item(&burger(), 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn removal_drops_lines_that_reach_zero() {
        let mut cart = Cart::default();
        cart.add(&Addition::from_item(&burger(), 2));
        cart.add(&Addition::from_item(&fries(), 1));

        cart.remove_quantity(&Removal { item_id: MenuItemId("burger".to_string()), qty: 1 });
        cart.remove_quantity(&Removal { item_id: MenuItemId("fries".to_string()), qty: 5 });

        assert_eq!(cart.describe(), "1 x Burger");
        assert_eq!(cart.snapshot().item_count, 1);
    }
}
