//! Fixed repair pipeline applied to every model-written reply before it
//! leaves the process. Repairs are logged, never surfaced.

use regex::Regex;
use tracing::warn;

use ordermate_core::domain::cart::Cart;
use ordermate_core::domain::tenant::TenantConfig;
use ordermate_core::replies;

const EMPTY_CART_CLAIMS: &[&str] = &[
    "cart is empty",
    "cart is currently empty",
    "cart is still empty",
    "cart is now empty",
    "cart's empty",
    "nothing in your cart",
    "no items in your cart",
    "your cart has no items",
];

/// True when the text asserts that the cart holds nothing.
pub fn claims_empty_cart(text: &str) -> bool {
    let lowered = text.to_lowercase();
    EMPTY_CART_CLAIMS.iter().any(|claim| lowered.contains(claim))
}

pub struct ReplyContext<'a> {
    pub tenant: &'a TenantConfig,
    pub cart: &'a Cart,
}

pub trait ReplyPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Some` carries the repaired text.
    fn apply(&self, text: &str, context: &ReplyContext<'_>) -> Option<String>;
}

pub struct StripStructuredTail {
    tail: Regex,
}

impl StripStructuredTail {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { tail: Regex::new(r"\s*\{[\s\S]*\}\s*$")? })
    }
}

impl ReplyPolicy for StripStructuredTail {
    fn name(&self) -> &'static str {
        "strip_structured_tail"
    }

    fn apply(&self, text: &str, _context: &ReplyContext<'_>) -> Option<String> {
        self.tail.is_match(text).then(|| self.tail.replace(text, "").trim().to_string())
    }
}

pub struct StripEvaluationArtifacts {
    patterns: Vec<Regex>,
}

impl StripEvaluationArtifacts {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = [
            r"(?im)An improved response could be[:'].*$",
            r"(?im)This (acknowledges|addresses|handles|fixes|resolves).*$",
            r"(?im)^This response (fails|passes).*$",
            r"(?m)^PASS\b.*$",
            r"(?m)^FEEDBACK\b.*$",
            r"(?m)^SUGGESTION\b.*$",
        ]
        .into_iter()
        .map(Regex::new)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl ReplyPolicy for StripEvaluationArtifacts {
    fn name(&self) -> &'static str {
        "strip_evaluation_artifacts"
    }

    fn apply(&self, text: &str, _context: &ReplyContext<'_>) -> Option<String> {
        if !self.patterns.iter().any(|pattern| pattern.is_match(text)) {
            return None;
        }
        let cleaned = self
            .patterns
            .iter()
            .fold(text.to_string(), |acc, pattern| pattern.replace_all(&acc, "").into_owned());
        Some(cleaned.trim().to_string())
    }
}

pub struct EvaluationLeakFallback {
    leak: Regex,
}

impl EvaluationLeakFallback {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            leak: Regex::new(
                r"(?i)improved response|evaluation|PASS[:=]|FEEDBACK[:=]|SUGGESTION[:=]|This response",
            )?,
        })
    }

    pub fn leaks(&self, text: &str) -> bool {
        text.trim().is_empty() || self.leak.is_match(text)
    }
}

impl ReplyPolicy for EvaluationLeakFallback {
    fn name(&self) -> &'static str {
        "evaluation_leak_fallback"
    }

    fn apply(&self, text: &str, _context: &ReplyContext<'_>) -> Option<String> {
        self.leaks(text).then(|| replies::LEAK_FALLBACK.to_string())
    }
}

/// Unconditional: a non-empty cart is never reported as empty.
pub struct CartTruthGuard;

impl ReplyPolicy for CartTruthGuard {
    fn name(&self) -> &'static str {
        "cart_truth_guard"
    }

    fn apply(&self, text: &str, context: &ReplyContext<'_>) -> Option<String> {
        (!context.cart.is_empty() && claims_empty_cart(text))
            .then(|| replies::cart_summary(context.tenant, context.cart))
    }
}

pub struct ReplyPipeline {
    policies: Vec<Box<dyn ReplyPolicy>>,
}

impl ReplyPipeline {
    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self {
            policies: vec![
                Box::new(StripStructuredTail::new()?),
                Box::new(StripEvaluationArtifacts::new()?),
                Box::new(EvaluationLeakFallback::new()?),
                Box::new(CartTruthGuard),
            ],
        })
    }

    pub fn policy_names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|policy| policy.name()).collect()
    }

    pub fn run(&self, text: &str, context: &ReplyContext<'_>) -> String {
        let mut current = text.trim().to_string();
        for policy in &self.policies {
            if let Some(repaired) = policy.apply(&current, context) {
                warn!(
                    event_name = "reply.repaired",
                    policy = policy.name(),
                    tenant_id = %context.tenant.tenant_id,
                    "reply repaired before delivery"
                );
                current = repaired;
            }
        }
        current
    }
}
