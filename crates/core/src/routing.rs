use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Fast,
    ModelAssisted,
    Ignore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastIntent {
    TotalQuery,
    AddItems,
    Checkout,
    Affirmative,
    Greeting,
    ShowMenu,
    CartStatus,
    Help,
}

impl FastIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalQuery => "total_query",
            Self::AddItems => "add_items",
            Self::Checkout => "checkout",
            Self::Affirmative => "affirmative",
            Self::Greeting => "greeting",
            Self::ShowMenu => "show_menu",
            Self::CartStatus => "cart_status",
            Self::Help => "help",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteDecision {
    pub route: Route,
    pub intent: Option<FastIntent>,
    /// False when the tenant runs without a language model.
    pub model_permitted: bool,
}

/// Ordered pattern table. First match wins. Checkout is matched before the
/// leading-verb item patterns so "I want to checkout" places the order.
const ROUTE_TABLE: &[(FastIntent, &[&str])] = &[
    (
        FastIntent::TotalQuery,
        &[r"\b(total|bill|how much|what do i owe|cost|price)\b"],
    ),
    (
        FastIntent::Checkout,
        &[
            r"\b(check ?out|place (my |the |an )?order|confirm( my| the)? order|finish( my order)?)\b",
            r"\bthat'?s (all|it for now)\b",
            r"\b(i'?m|i am|we'?re|all) done\b",
            r"^(confirm|done)\b",
        ],
    ),
    (FastIntent::Affirmative, &[r"^add (it|that|them|those)[\s!.,]*(please)?[\s!.]*$"]),
    (
        FastIntent::AddItems,
        &[
            r"\b(\d+x?|one|two|three|four|five|six|seven|eight|nine|ten)\s+[a-z]",
            r"^(add|i'?ll (have|take)|i will (have|take)|i want|i'?d like|give me|get me)\b",
        ],
    ),
    (
        FastIntent::Affirmative,
        &[
            r"^(yes|yeah|yep|yup|ya|sure|ok|okay|alright|go ahead|sounds good)\b",
            r"^please[\s!.,]*$",
        ],
    ),
    (
        FastIntent::Greeting,
        &[r"^(hi+|hello|hey|hiya|salaam?|assalam[a-z ]*|good (morning|afternoon|evening))[\s!.,]*$"],
    ),
    (
        FastIntent::ShowMenu,
        &[r"\b(menu|what do you (have|serve|sell)|list (the )?items|show (me )?(the )?items|options)\b"],
    ),
    (FastIntent::CartStatus, &[r"\b(cart|basket|my order|order so far)\b"]),
    (FastIntent::Help, &[r"^(help|support)\b", r"\bhow (does this work|do i order)\b"]),
];

#[derive(Clone, Debug)]
pub struct IntentRouter {
    table: Vec<(FastIntent, Vec<Regex>)>,
}

impl IntentRouter {
    pub fn new() -> Result<Self, regex::Error> {
        let table = ROUTE_TABLE
            .iter()
            .map(|(intent, patterns)| {
                patterns
                    .iter()
                    .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
                    .collect::<Result<Vec<_>, _>>()
                    .map(|compiled| (*intent, compiled))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { table })
    }

    /// Pure: no I/O and no randomness.
    pub fn classify(&self, text: &str, tenant: &TenantConfig) -> RouteDecision {
        let model_permitted = tenant.model_permitted();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return RouteDecision { route: Route::Ignore, intent: None, model_permitted };
        }

        let matched = self
            .table
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|pattern| pattern.is_match(trimmed)))
            .map(|(intent, _)| *intent);

        match matched {
            Some(intent) => RouteDecision { route: Route::Fast, intent: Some(intent), model_permitted },
            None => RouteDecision { route: Route::ModelAssisted, intent: None, model_permitted },
        }
    }
}
