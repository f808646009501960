//! Templated replies used by the deterministic paths and reply repairs.

use crate::domain::cart::{Addition, Cart};
use crate::domain::menu::Menu;
use crate::domain::order::OrderProjection;
use crate::domain::tenant::TenantConfig;

pub const EMPTY_CART_CHECKOUT: &str =
    "🛒 Your cart is empty! Please add something from the menu before confirming.";
pub const ORDER_SUBMIT_FAILED: &str =
    "I'm sorry, there was an error processing your order. Please try again.";
pub const GENERATION_APOLOGY: &str =
    "I'm having trouble generating a good response right now. Please try again in a moment.";
pub const SERVICE_APOLOGY: &str =
    "Sorry, something went wrong on our side. Your cart is safe, please try again shortly.";
pub const LEAK_FALLBACK: &str =
    "I'd be happy to help with your order from our menu. What would you like today?";
pub const CLARIFY_AFFIRMATIVE: &str =
    "I'm not sure which item you'd like me to add. Could you tell me the item name and quantity?";

pub fn greeting(tenant: &TenantConfig) -> String {
    format!(
        "Welcome to {}! Would you like to see our menu, or do you already know what you'd like?",
        tenant.display_name
    )
}

pub fn menu_listing(tenant: &TenantConfig, menu: &Menu) -> String {
    if menu.is_empty() {
        return format!("{} has nothing on the menu right now. Please check back soon.", tenant.display_name);
    }
    let mut reply = format!("Here is the {} menu:", tenant.display_name);
    for item in &menu.items {
        reply.push_str(&format!("\n• {} - {}", item.title, tenant.format_amount(item.price)));
    }
    if let Some(first) = menu.items.first() {
        reply.push_str(&format!(
            "\nJust tell me what you'd like, for example \"2 {}\".",
            first.title
        ));
    }
    reply
}

/// The truthful cart statement. Also used to overwrite replies that
/// misreport the cart.
pub fn cart_summary(tenant: &TenantConfig, cart: &Cart) -> String {
    if cart.is_empty() {
        return "Your cart is empty. Would you like to see the menu?".to_string();
    }
    format!(
        "Your cart currently contains {}, for a total of {}. Would you like to add anything else or proceed to checkout?",
        cart.describe(),
        tenant.format_amount(cart.total())
    )
}

pub fn total(tenant: &TenantConfig, cart: &Cart) -> String {
    if cart.is_empty() {
        return format!(
            "You haven't added anything yet, so your total is {}. Would you like to see the menu?",
            tenant.format_amount(cart.total())
        );
    }
    format!(
        "Your total is {} for {}. Would you like to add anything else or proceed to checkout?",
        tenant.format_amount(cart.total()),
        cart.describe()
    )
}

pub fn items_added(tenant: &TenantConfig, additions: &[Addition], cart_after: &Cart) -> String {
    let added = additions
        .iter()
        .map(|addition| format!("{} x {}", addition.qty, addition.title))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Added {added}. Your cart total is now {}. Would you like anything else?",
        tenant.format_amount(cart_after.total())
    )
}

pub fn order_confirmed(tenant: &TenantConfig, order: &OrderProjection) -> String {
    let mut reply = String::from("✅ Order confirmed!\nYour items:");
    for line in &order.lines {
        reply.push_str(&format!(
            "\n• {} x {} ({})",
            line.qty,
            line.title,
            tenant.format_amount(line.subtotal)
        ));
    }
    reply.push_str(&format!(
        "\nTotal: {}\nThank you for ordering from {}!",
        tenant.format_amount(order.total),
        tenant.display_name
    ));
    reply
}

pub fn not_on_menu() -> String {
    "Sorry, I couldn't find that on our menu. Say \"menu\" to see what we have.".to_string()
}

pub fn help(tenant: &TenantConfig) -> String {
    format!(
        "I can take your order for {}. Say \"menu\" to browse, name items with quantities like \"2 fries\", \"cart\" to review, or \"checkout\" to place the order.",
        tenant.display_name
    )
}

pub fn deterministic_fallback(tenant: &TenantConfig) -> String {
    format!(
        "I can help you order from {}. Try \"menu\", \"2 fries\", \"cart\" or \"checkout\".",
        tenant.display_name
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{cart_summary, order_confirmed, total};
    use crate::domain::cart::{Addition, Cart};
    use crate::domain::menu::MenuItem;
    use crate::domain::order::OrderProjection;
    use crate::domain::session::SessionKey;
    use crate::domain::tenant::TenantConfig;

    fn cart() -> Cart {
        let mut cart = Cart::default();
        cart.add(&Addition::from_item(&MenuItem::new("a", "Item A", Decimal::new(100, 0)), 2));
        cart.add(&Addition::from_item(&MenuItem::new("b", "Item B", Decimal::new(50, 0)), 1));
        cart
    }

    #[test]
    fn summary_and_total_state_the_exact_amount() {
        let tenant = TenantConfig::new("bistro", "Bistro");

        assert_eq!(
            cart_summary(&tenant, &cart()),
            "Your cart currently contains 2 x Item A, 1 x Item B, for a total of Rs.250. Would you like to add anything else or proceed to checkout?"
        );
        assert!(total(&tenant, &cart()).starts_with("Your total is Rs.250"));
        assert!(!total(&tenant, &cart()).to_lowercase().contains("cart is empty"));
    }

    #[test]
    fn order_confirmation_lists_subtotals() {
        let tenant = TenantConfig::new("bistro", "Bistro");
        let order = OrderProjection::from_cart(&SessionKey::new("bistro", "u"), &cart(), Utc::now())
            .expect("order");

        let reply = order_confirmed(&tenant, &order);

        assert!(reply.contains("• 2 x Item A (Rs.200)"));
        assert!(reply.contains("Total: Rs.250"));
    }
}
