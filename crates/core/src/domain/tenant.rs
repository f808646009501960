use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How much of a conversation a tenant lets the language model handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantMode {
    /// Pattern routes first, model for everything else.
    #[default]
    Hybrid,
    /// Pattern routes only; unmatched text gets a templated clarification.
    DeterministicOnly,
}

impl AssistantMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::DeterministicOnly => "deterministic_only",
        }
    }
}

impl std::str::FromStr for AssistantMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hybrid" | "llm" | "llm_only" => Ok(Self::Hybrid),
            "deterministic_only" | "deterministic" | "rules" => Ok(Self::DeterministicOnly),
            other => Err(format!("unsupported assistant mode `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub currency_symbol: String,
    pub assistant_mode: AssistantMode,
}

impl TenantConfig {
    pub fn new(tenant_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            tenant_id: TenantId(tenant_id.into()),
            display_name: display_name.into(),
            currency_symbol: "Rs.".to_string(),
            assistant_mode: AssistantMode::Hybrid,
        }
    }

    pub fn model_permitted(&self) -> bool {
        matches!(self.assistant_mode, AssistantMode::Hybrid)
    }

    pub fn format_amount(&self, amount: Decimal) -> String {
        format!("{}{}", self.currency_symbol, amount.round_dp(2).normalize())
    }
}
