//! Quality gate for model drafts.
//!
//! [`RubricEvaluator`] checks the hard business rules deterministically.
//! [`ModelJudgeEvaluator`] asks a model for a verdict and, when it cannot be
//! reached, lets the draft through: the post-processing pipeline still runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use ordermate_core::cart::lexicon::{contains_sequence, fold, folded_words};
use ordermate_core::cart::{is_bare_confirmation, CartEngine};
use ordermate_core::dialogue::DialogueState;
use ordermate_core::domain::cart::Cart;
use ordermate_core::domain::menu::Menu;
use ordermate_core::replies;

use crate::llm::{ChatMessage, CompletionRequest, DraftFields, DraftIntent, LlmClient, LlmError};
use crate::postprocess::claims_empty_cart;
use crate::prompt::{PromptBuilder, PromptInput};

const JUDGE_TEMPERATURE: f32 = 0.2;
const JUDGE_MAX_TOKENS: u32 = 500;

/// Food and drink categories a reply might offer. Mentioning one the menu
/// does not carry is a menu accuracy failure.
const KNOWN_CATEGORIES: &[&str] = &[
    "drink", "beverage", "soda", "coke", "juice", "coffee", "tea", "shake", "milkshake",
    "smoothie", "beer", "wine", "dessert", "ice cream", "cake", "pizza", "pasta", "salad",
    "soup", "sushi", "sandwich", "wrap", "taco", "noodle", "steak",
];

const LEAK_MARKERS: &[&str] = &[
    "reply_text",
    "orderitems",
    "improved response",
    "evaluation",
    "this response",
    "pass:",
    "pass=",
    "feedback:",
    "feedback=",
    "suggestion:",
    "suggestion=",
];

const NEGATION_CUES: &[&str] =
    &["don't", "do not", "dont", "not", "no ", "sorry", "unfortunately", "unavailable"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub pass: bool,
    pub feedback: String,
    pub suggestion: Option<String>,
    pub attempt: u32,
}

impl Evaluation {
    pub fn pass(attempt: u32) -> Self {
        Self { pass: true, feedback: String::new(), suggestion: None, attempt }
    }

    pub fn fail(feedback: impl Into<String>, suggestion: Option<String>, attempt: u32) -> Self {
        Self { pass: false, feedback: feedback.into(), suggestion, attempt }
    }
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn check(&self, draft: &DraftFields, input: &PromptInput<'_>, attempt: u32) -> Evaluation;
}

#[derive(Debug, Default)]
pub struct RubricEvaluator {
    engine: CartEngine,
}

impl RubricEvaluator {
    /// The cart as it stands once the draft's own additions land.
    pub fn projected_cart(&self, draft: &DraftFields, input: &PromptInput<'_>) -> Cart {
        let mut cart = input.session.cart.clone();
        if draft.intent == DraftIntent::AddToCart {
            let additions = self.engine.reconcile_proposals(&draft.order_items, input.menu);
            self.engine.apply(&mut cart, &additions);
        }
        cart
    }

    pub fn findings(&self, draft: &DraftFields, input: &PromptInput<'_>) -> Vec<String> {
        let mut findings = Vec::new();
        let text = draft.reply_text.trim();
        let cart = &self.projected_cart(draft, input);

        if text.is_empty() {
            findings.push("Empty reply: the response must address the customer's message (relevance)".to_string());
        }

        if !cart.is_empty() && claims_empty_cart(text) {
            findings.push(format!(
                "Reply says the cart is empty but the cart contains {}",
                cart.describe()
            ));
        }

        if leaks_structure(text) {
            findings.push("Reply contains JSON or evaluation text; format must be plain conversational text".to_string());
        }

        for category in off_menu_mentions(text, input.menu) {
            findings.push(format!("Reply offers {category}, which is not on the menu"));
        }

        for proposal in &draft.order_items {
            if self.engine.reconcile_proposals(std::slice::from_ref(proposal), input.menu).is_empty() {
                findings.push(format!("Proposed item `{}` is not on the menu", proposal.title));
            }
        }

        let confirming_checkout = input.state == DialogueState::CheckoutConfirmation
            && is_bare_confirmation(input.user_text);
        if confirming_checkout && draft.intent == DraftIntent::AddToCart && !draft.order_items.is_empty() {
            findings.push(
                "Customer is confirming checkout: use intent confirm and do not add items to the cart again"
                    .to_string(),
            );
        }

        let proposed = self.engine.reconcile_proposals(&draft.order_items, input.menu);
        let resolved_count = draft
            .order_items
            .iter()
            .filter(|proposal| {
                !self.engine.reconcile_proposals(std::slice::from_ref(proposal), input.menu).is_empty()
            })
            .count();
        if resolved_count > proposed.len() {
            findings.push("Duplicate additions: the same item appears more than once in orderItems".to_string());
        }

        findings
    }
}

#[async_trait]
impl Evaluator for RubricEvaluator {
    async fn check(&self, draft: &DraftFields, input: &PromptInput<'_>, attempt: u32) -> Evaluation {
        let findings = self.findings(draft, input);
        if findings.is_empty() {
            return Evaluation::pass(attempt);
        }

        let cart = self.projected_cart(draft, input);
        let suggestion = (!cart.is_empty() && claims_empty_cart(&draft.reply_text))
            .then(|| replies::cart_summary(input.tenant, &cart));
        Evaluation::fail(findings.join("; "), suggestion, attempt)
    }
}

fn leaks_structure(text: &str) -> bool {
    let lowered = text.to_lowercase();
    (text.contains('{') && text.contains('}'))
        || LEAK_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Categories named in offering sentences that no menu item covers.
fn off_menu_mentions(text: &str, menu: &Menu) -> Vec<&'static str> {
    let mut vocabulary: Vec<String> = Vec::new();
    for item in &menu.items {
        vocabulary.extend(folded_words(&item.title));
        vocabulary.extend(item.tags.iter().flat_map(|tag| folded_words(tag)));
        vocabulary.extend(item.aliases.iter().flat_map(|alias| folded_words(alias)));
    }

    let mut mentions = Vec::new();
    for sentence in text.split(&['.', '!', '?', '\n'][..]) {
        let lowered = sentence.to_lowercase();
        if NEGATION_CUES.iter().any(|cue| lowered.contains(cue)) {
            continue;
        }
        let words = folded_words(&lowered);
        for category in KNOWN_CATEGORIES {
            let category_words = category.split(' ').map(fold).collect::<Vec<_>>();
            let mentioned = contains_sequence(&words, &category_words);
            let served = category_words.iter().all(|word| vocabulary.contains(word));
            if mentioned && !served && !mentions.contains(category) {
                mentions.push(*category);
            }
        }
    }
    mentions
}

#[derive(Deserialize)]
struct JudgeVerdict {
    #[serde(rename = "PASS", alias = "pass")]
    pass: serde_json::Value,
    #[serde(default, rename = "FEEDBACK", alias = "feedback")]
    feedback: Option<String>,
    #[serde(default, rename = "SUGGESTION", alias = "suggestion")]
    suggestion: Option<String>,
}

pub struct ModelJudgeEvaluator {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptBuilder>,
    timeout: Duration,
}

impl ModelJudgeEvaluator {
    pub fn new(client: Arc<dyn LlmClient>, prompts: Arc<PromptBuilder>, timeout: Duration) -> Self {
        Self { client, prompts, timeout }
    }

    async fn verdict(&self, draft: &DraftFields, input: &PromptInput<'_>) -> Result<String, LlmError> {
        let prompt = self
            .prompts
            .judge_prompt(input, draft)
            .map_err(|error| LlmError::InvalidResponse(format!("judge prompt: {error}")))?;
        let request = CompletionRequest {
            messages: vec![ChatMessage::system(prompt)],
            temperature: JUDGE_TEMPERATURE,
            max_tokens: JUDGE_MAX_TOKENS,
        };
        match tokio::time::timeout(self.timeout, self.client.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl Evaluator for ModelJudgeEvaluator {
    async fn check(&self, draft: &DraftFields, input: &PromptInput<'_>, attempt: u32) -> Evaluation {
        let raw = match self.verdict(draft, input).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "evaluator.judge.unavailable",
                    attempt,
                    error = %error,
                    "judge unavailable, accepting draft"
                );
                return Evaluation::pass(attempt);
            }
        };
        parse_verdict(&raw, attempt)
    }
}

fn parse_verdict(raw: &str, attempt: u32) -> Evaluation {
    let body = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    };

    match serde_json::from_str::<JudgeVerdict>(body) {
        Ok(verdict) => {
            let pass = match &verdict.pass {
                serde_json::Value::Bool(value) => *value,
                serde_json::Value::String(value) => value.eq_ignore_ascii_case("true"),
                _ => false,
            };
            if pass {
                Evaluation::pass(attempt)
            } else {
                let suggestion = verdict.suggestion.filter(|text| !text.trim().is_empty());
                Evaluation::fail(
                    verdict.feedback.unwrap_or_else(|| "No specific feedback provided".to_string()),
                    suggestion,
                    attempt,
                )
            }
        }
        Err(error) => {
            debug!(event_name = "evaluator.judge.unparsed", error = %error, "judge verdict is not JSON");
            let lowered = raw.to_lowercase();
            let pass = lowered.find("pass").is_some_and(|index| {
                lowered[index + 4..].trim_start_matches(|c: char| !c.is_alphanumeric()).starts_with("true")
            });
            if pass {
                Evaluation::pass(attempt)
            } else {
                Evaluation::fail(format!("Unreadable judge verdict: {error}"), None, attempt)
            }
        }
    }
}

/// Rubric first; the judge only sees drafts the rubric accepts.
pub struct LayeredEvaluator {
    rubric: RubricEvaluator,
    judge: Option<ModelJudgeEvaluator>,
}

impl LayeredEvaluator {
    pub fn new(judge: Option<ModelJudgeEvaluator>) -> Self {
        Self { rubric: RubricEvaluator::default(), judge }
    }
}

#[async_trait]
impl Evaluator for LayeredEvaluator {
    async fn check(&self, draft: &DraftFields, input: &PromptInput<'_>, attempt: u32) -> Evaluation {
        let evaluation = self.rubric.check(draft, input, attempt).await;
        match &self.judge {
            Some(judge) if evaluation.pass => judge.check(draft, input, attempt).await,
            _ => evaluation,
        }
    }
}
