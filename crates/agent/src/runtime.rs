//! One inbound message in, one reply out.
//!
//! The turn is computed against a loaded snapshot and every effect is
//! collected into a [`SessionUpdate`]; the store sees a single save at the
//! end or nothing at all.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use ordermate_core::cart::{has_quantity, CartEngine, CheckoutOutcome};
use ordermate_core::config::AppConfig;
use ordermate_core::dialogue::{AssistantCue, DialogueMachine, DialogueState, TurnOutcome};
use ordermate_core::domain::cart::{Addition, Cart};
use ordermate_core::domain::menu::{Menu, MenuItemId};
use ordermate_core::domain::message::{InboundMessage, OutboundReply, ReplyIntent};
use ordermate_core::domain::session::{Message, Session, SessionKey, SessionUpdate};
use ordermate_core::domain::tenant::TenantConfig;
use ordermate_core::errors::{ConversationError, LookupError};
use ordermate_core::ports::{MenuProvider, OrderSink, SessionStore, TenantDirectory};
use ordermate_core::replies;
use ordermate_core::routing::{FastIntent, IntentRouter, Route};

use crate::evaluator::{Evaluator, LayeredEvaluator, ModelJudgeEvaluator};
use crate::guardrails::{ProposalContext, ProposalPolicy};
use crate::learning::LearningLog;
use crate::llm::{DraftIntent, LlmClient};
use crate::orchestrator::{Generation, OrchestratorSettings, ResponseOrchestrator};
use crate::postprocess::{ReplyContext, ReplyPipeline};
use crate::prompt::{PromptBuilder, PromptInput, DEFAULT_HISTORY_WINDOW};

const DEFAULT_HISTORY_MESSAGES: usize = 16;
const MENU_LISTING_THRESHOLD: usize = 3;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid pattern table: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid prompt template: {0}")]
    Template(#[from] tera::Error),
}

pub struct RuntimeDeps {
    pub tenants: Arc<dyn TenantDirectory>,
    pub menus: Arc<dyn MenuProvider>,
    pub sessions: Arc<dyn SessionStore>,
    pub orders: Arc<dyn OrderSink>,
}

pub struct RuntimeBuilder {
    deps: RuntimeDeps,
    orchestrator: Option<ResponseOrchestrator>,
    submit_attempts: u32,
    max_history_messages: usize,
    proposals: ProposalPolicy,
}

impl RuntimeBuilder {
    pub fn orchestrator(mut self, orchestrator: ResponseOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn submit_attempts(mut self, attempts: u32) -> Self {
        self.submit_attempts = attempts.max(1);
        self
    }

    pub fn max_history_messages(mut self, messages: usize) -> Self {
        self.max_history_messages = messages.max(2);
        self
    }

    pub fn proposals(mut self, proposals: ProposalPolicy) -> Self {
        self.proposals = proposals;
        self
    }

    /// Applies order, session and model settings. Without a client the
    /// runtime answers free-form messages deterministically.
    pub fn configured(
        self,
        config: &AppConfig,
        client: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self, RuntimeError> {
        let builder = self
            .submit_attempts(config.orders.submit_attempts)
            .max_history_messages(config.session.max_history_messages());
        let Some(client) = client else {
            return Ok(builder);
        };

        let prompts = Arc::new(PromptBuilder::new(DEFAULT_HISTORY_WINDOW)?);
        let judge = config.evaluation.model_judge.then(|| {
            ModelJudgeEvaluator::new(
                client.clone(),
                prompts.clone(),
                Duration::from_secs(config.llm.timeout_secs.max(1)),
            )
        });
        let evaluator: Arc<dyn Evaluator> = Arc::new(LayeredEvaluator::new(judge));
        let orchestrator = ResponseOrchestrator::new(
            client,
            prompts,
            evaluator,
            Arc::new(LearningLog::default()),
            OrchestratorSettings::from_config(config),
        );
        Ok(builder.orchestrator(orchestrator))
    }

    pub fn build(self) -> Result<ConversationRuntime, RuntimeError> {
        Ok(ConversationRuntime {
            deps: self.deps,
            orchestrator: self.orchestrator,
            router: IntentRouter::new()?,
            dialogue: DialogueMachine::new()?,
            cart: CartEngine::new(self.submit_attempts),
            replies: ReplyPipeline::standard()?,
            proposals: self.proposals,
            max_history_messages: self.max_history_messages,
        })
    }
}

/// Everything one turn decided, before anything is persisted.
struct TurnPlan {
    reply_text: String,
    intent: ReplyIntent,
    update: SessionUpdate,
    outcome: TurnOutcome,
    /// The user's message put items in the cart.
    applied: bool,
    persist: bool,
}

impl TurnPlan {
    fn reply(reply_text: impl Into<String>, intent: ReplyIntent) -> Self {
        Self {
            reply_text: reply_text.into(),
            intent,
            update: SessionUpdate::default(),
            outcome: TurnOutcome::Replied,
            applied: false,
            persist: true,
        }
    }

    /// A degraded reply that leaves the session exactly as it was.
    fn untouched(reply_text: impl Into<String>, intent: ReplyIntent) -> Self {
        Self { persist: false, ..Self::reply(reply_text, intent) }
    }

    fn adding(tenant: &TenantConfig, cart: &Cart, additions: Vec<Addition>) -> Self {
        let mut cart_after = cart.clone();
        for addition in &additions {
            cart_after.add(addition);
        }
        let mut plan = Self::reply(replies::items_added(tenant, &additions, &cart_after), ReplyIntent::AddToCart);
        plan.update.additions = additions;
        plan.update.awaiting_confirmation = Some(false);
        plan.outcome = TurnOutcome::ItemsAdded;
        plan.applied = true;
        plan
    }
}

struct Turn<'a> {
    key: &'a SessionKey,
    tenant: &'a TenantConfig,
    menu: &'a Menu,
    session: &'a Session,
    text: &'a str,
    state: DialogueState,
    previous_cue: AssistantCue,
}

pub struct ConversationRuntime {
    deps: RuntimeDeps,
    orchestrator: Option<ResponseOrchestrator>,
    router: IntentRouter,
    dialogue: DialogueMachine,
    cart: CartEngine,
    replies: ReplyPipeline,
    proposals: ProposalPolicy,
    max_history_messages: usize,
}

impl ConversationRuntime {
    pub fn builder(deps: RuntimeDeps) -> RuntimeBuilder {
        RuntimeBuilder {
            deps,
            orchestrator: None,
            submit_attempts: 2,
            max_history_messages: DEFAULT_HISTORY_MESSAGES,
            proposals: ProposalPolicy::default(),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.deps.sessions
    }

    pub async fn handle_message(
        &self,
        inbound: InboundMessage,
    ) -> Result<OutboundReply, ConversationError> {
        let key = inbound.validate()?;
        let tenant = match self.deps.tenants.find(&key.tenant_id).await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => return Err(LookupError::UnknownTenant(key.tenant_id.to_string()).into()),
            Err(port_error) => {
                warn!(
                    event_name = "conversation.tenant_lookup.unavailable",
                    session_key = %key,
                    error = %port_error,
                    "tenant directory unavailable"
                );
                return Ok(self.unsaved_reply(&key, replies::SERVICE_APOLOGY, ReplyIntent::Error).await);
            }
        };
        let menu = match self.deps.menus.get(&key.tenant_id).await {
            Ok(Some(menu)) => menu,
            Ok(None) => return Err(LookupError::MenuUnavailable(key.tenant_id.to_string()).into()),
            Err(port_error) => {
                warn!(
                    event_name = "conversation.menu_lookup.unavailable",
                    session_key = %key,
                    error = %port_error,
                    "menu provider unavailable"
                );
                return Ok(self.unsaved_reply(&key, replies::SERVICE_APOLOGY, ReplyIntent::Error).await);
            }
        };

        let text = inbound.text.trim();
        let decision = self.router.classify(text, &tenant);
        if decision.route == Route::Ignore {
            return Ok(self.unsaved_reply(&key, "", ReplyIntent::Ignored).await);
        }

        let _guard = self.deps.sessions.acquire(&key).await;
        let session = self.deps.sessions.load(&key).await;
        let transition = self.dialogue.observe(&session, text);
        let turn = Turn {
            key: &key,
            tenant: &tenant,
            menu: &menu,
            session: &session,
            text,
            state: transition.to,
            previous_cue: transition.signals.previous_assistant_cue,
        };

        let plan = match decision.intent {
            Some(intent) => self.fast_path(&turn, intent, decision.model_permitted).await,
            None => self.model_path(&turn).await,
        };

        info!(
            event_name = "conversation.turn.planned",
            session_key = %key,
            route = ?decision.route,
            fast_intent = decision.intent.map(FastIntent::as_str),
            reply_intent = plan.intent.as_str(),
            state = transition.to.as_str(),
            persist = plan.persist,
            "turn planned"
        );

        if !plan.persist {
            return Ok(OutboundReply {
                reply_text: plan.reply_text,
                intent: plan.intent,
                cart_snapshot: session.cart.snapshot(),
                session_key: key.to_string(),
            });
        }

        let mut update = plan.update;
        update.messages = vec![
            Message::user(text).applied(plan.applied),
            Message::assistant(plan.reply_text.clone()),
        ];
        update.dialogue_state = Some(self.dialogue.settle(transition.to, plan.outcome));

        let max_messages = self.max_history_messages;
        let mutator = |record: &mut Session| update.apply(record, max_messages);
        match self.deps.sessions.save(&key, &mutator).await {
            Ok(saved) => Ok(OutboundReply {
                reply_text: plan.reply_text,
                intent: plan.intent,
                cart_snapshot: saved.cart.snapshot(),
                session_key: key.to_string(),
            }),
            Err(store_error) => {
                error!(
                    event_name = "conversation.session.save_failed",
                    session_key = %key,
                    error = %store_error,
                    "session save failed, turn discarded"
                );
                Ok(OutboundReply {
                    reply_text: replies::SERVICE_APOLOGY.to_string(),
                    intent: ReplyIntent::Error,
                    cart_snapshot: session.cart.snapshot(),
                    session_key: key.to_string(),
                })
            }
        }
    }

    async fn unsaved_reply(&self, key: &SessionKey, text: &str, intent: ReplyIntent) -> OutboundReply {
        let session = self.deps.sessions.load(key).await;
        OutboundReply {
            reply_text: text.to_string(),
            intent,
            cart_snapshot: session.cart.snapshot(),
            session_key: key.to_string(),
        }
    }

    async fn fast_path(&self, turn: &Turn<'_>, intent: FastIntent, model_permitted: bool) -> TurnPlan {
        let cart = &turn.session.cart;
        match intent {
            FastIntent::TotalQuery => {
                TurnPlan::reply(replies::total(turn.tenant, cart), ReplyIntent::CartSummary)
            }
            FastIntent::CartStatus => {
                TurnPlan::reply(replies::cart_summary(turn.tenant, cart), ReplyIntent::CartSummary)
            }
            FastIntent::Greeting => TurnPlan::reply(replies::greeting(turn.tenant), ReplyIntent::Greeting),
            FastIntent::Help => TurnPlan::reply(replies::help(turn.tenant), ReplyIntent::Info),
            FastIntent::ShowMenu => {
                let mut plan =
                    TurnPlan::reply(replies::menu_listing(turn.tenant, turn.menu), ReplyIntent::Menu);
                plan.update.awaiting_confirmation = Some(false);
                plan
            }
            FastIntent::Checkout => self.checkout(turn).await,
            FastIntent::AddItems => {
                let additions = self.cart.additions_from_text(turn.text, turn.menu);
                if !additions.is_empty() {
                    return TurnPlan::adding(turn.tenant, cart, additions);
                }
                if model_permitted && self.orchestrator.is_some() {
                    return self.model_path(turn).await;
                }
                TurnPlan::reply(replies::not_on_menu(), ReplyIntent::Clarify)
            }
            FastIntent::Affirmative => {
                if turn.previous_cue == AssistantCue::CheckoutQuestion
                    || turn.state == DialogueState::CheckoutConfirmation
                {
                    return self.checkout(turn).await;
                }
                match self.cart.resolve_affirmative(turn.text, turn.session, turn.menu) {
                    Some(resolution) => {
                        info!(
                            event_name = "cart.affirmative.resolved",
                            session_key = %turn.key,
                            strategy = resolution.strategy,
                            items = resolution.additions.len(),
                            "affirmative resolved to items"
                        );
                        TurnPlan::adding(turn.tenant, cart, resolution.additions)
                    }
                    None if turn.previous_cue == AssistantCue::MenuListing
                        || offered_menu(turn.session) =>
                    {
                        TurnPlan::reply(replies::menu_listing(turn.tenant, turn.menu), ReplyIntent::Menu)
                    }
                    None => TurnPlan::reply(replies::CLARIFY_AFFIRMATIVE, ReplyIntent::Clarify),
                }
            }
        }
    }

    async fn checkout(&self, turn: &Turn<'_>) -> TurnPlan {
        match self.cart.checkout(turn.session, self.deps.orders.as_ref(), Utc::now()).await {
            CheckoutOutcome::EmptyCart => {
                let mut plan = TurnPlan::reply(replies::EMPTY_CART_CHECKOUT, ReplyIntent::Checkout);
                plan.outcome = TurnOutcome::CheckoutRejectedEmpty;
                plan
            }
            CheckoutOutcome::Placed { order, .. } => {
                let mut plan =
                    TurnPlan::reply(replies::order_confirmed(turn.tenant, &order), ReplyIntent::Confirm);
                plan.update.removals = order.removals();
                plan.update.awaiting_confirmation = Some(false);
                plan.update.last_suggested = Some(Vec::new());
                plan.outcome = TurnOutcome::OrderPlaced;
                plan
            }
            CheckoutOutcome::Failed { .. } => {
                TurnPlan::untouched(replies::ORDER_SUBMIT_FAILED, ReplyIntent::Error)
            }
        }
    }

    async fn model_path(&self, turn: &Turn<'_>) -> TurnPlan {
        let orchestrator = match &self.orchestrator {
            Some(orchestrator) if turn.tenant.model_permitted() => orchestrator,
            _ => {
                return TurnPlan::reply(replies::deterministic_fallback(turn.tenant), ReplyIntent::Clarify)
            }
        };

        let input = PromptInput {
            tenant: turn.tenant,
            menu: turn.menu,
            session: turn.session,
            user_text: turn.text,
            state: turn.state,
            focus: orchestrator.learning_focus(),
        };
        let (draft, evaluation) = match orchestrator.build_reply(&input).await {
            Generation::Drafted { draft, evaluation, .. } => (draft, evaluation),
            Generation::Failed { attempts, error: llm_error } => {
                warn!(
                    event_name = "conversation.generation.failed",
                    session_key = %turn.key,
                    attempts,
                    error = %llm_error,
                    "generation failed, replying with apology"
                );
                return TurnPlan::untouched(replies::GENERATION_APOLOGY, ReplyIntent::Error);
            }
        };

        if draft.intent == DraftIntent::Confirm {
            info!(
                event_name = "conversation.generation.checkout_requested",
                session_key = %turn.key,
                "model reply confirms checkout, placing the order"
            );
            return self.checkout(turn).await;
        }

        let user_named_items =
            has_quantity(turn.text) || !self.cart.additions_from_text(turn.text, turn.menu).is_empty();
        let additions = self.proposals.accepted(
            &draft.order_items,
            turn.menu,
            &self.cart,
            ProposalContext { state: turn.state, intent: draft.intent, user_named_items },
        );
        if additions.len() < draft.order_items.len() {
            info!(
                event_name = "cart.proposals.filtered",
                session_key = %turn.key,
                proposed = draft.order_items.len(),
                accepted = additions.len(),
                "model proposals filtered"
            );
        }

        let mut cart_after = turn.session.cart.clone();
        self.cart.apply(&mut cart_after, &additions);
        let reply_text = self
            .replies
            .run(&draft.reply_text, &ReplyContext { tenant: turn.tenant, cart: &cart_after });

        let mut plan = TurnPlan::reply(reply_text, draft.intent.reply_intent());
        let mentioned = suggested_items(&plan.reply_text, turn.menu, &additions);
        let listing = mentioned.len() >= MENU_LISTING_THRESHOLD
            && plan.reply_text.to_lowercase().contains("menu");
        let recommends = self.dialogue.assistant_cue(&plan.reply_text) == AssistantCue::Recommendation;
        plan.update.awaiting_confirmation = Some(recommends && !listing && !mentioned.is_empty());
        if !mentioned.is_empty() && !listing {
            plan.update.last_suggested = Some(mentioned);
        }

        plan.applied = !additions.is_empty();
        plan.outcome = if evaluation.is_some_and(|evaluation| !evaluation.pass) {
            TurnOutcome::Degraded
        } else if plan.applied {
            TurnOutcome::ItemsAdded
        } else {
            TurnOutcome::Replied
        };
        plan.update.additions = additions;
        plan
    }
}

fn offered_menu(session: &Session) -> bool {
    session
        .previous_assistant_message()
        .is_some_and(|message| message.content.to_lowercase().contains("see our menu"))
}

/// Menu items named in a reply; items the turn added come first.
fn suggested_items(reply: &str, menu: &Menu, additions: &[Addition]) -> Vec<MenuItemId> {
    let lowered = reply.to_lowercase();
    let mut items: Vec<MenuItemId> = additions.iter().map(|addition| addition.item_id.clone()).collect();
    for item in &menu.items {
        if lowered.contains(&item.title.to_lowercase()) && !items.contains(&item.id) {
            items.push(item.id.clone());
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use ordermate_core::dialogue::DialogueState;
    use ordermate_core::domain::menu::{Menu, MenuItemId};
    use ordermate_core::domain::message::{InboundMessage, ReplyIntent};
    use ordermate_core::domain::session::{Message, SessionKey};
    use ordermate_core::domain::tenant::{AssistantMode, TenantConfig};
    use ordermate_core::errors::{ConversationError, LookupError, ValidationError};
    use ordermate_core::ports::{OrderSink, SessionStore};
    use ordermate_db::repositories::memory::InMemoryCatalog;
    use ordermate_db::VersionedSessionStore;

    use super::{ConversationRuntime, RuntimeDeps};
    use crate::evaluator::RubricEvaluator;
    use crate::learning::LearningLog;
    use crate::llm::LlmClient;
    use crate::orchestrator::{OrchestratorSettings, ResponseOrchestrator};
    use crate::prompt::PromptBuilder;
    use crate::testing::{burger_menu, RecordingSink, ScriptedLlm};

    struct Harness {
        runtime: ConversationRuntime,
        sessions: Arc<dyn SessionStore>,
        sink: Arc<RecordingSink>,
        llm: Arc<ScriptedLlm>,
    }

    fn harness_with(tenant: TenantConfig, menu: Menu, sink: RecordingSink, llm: ScriptedLlm) -> Harness {
        let sessions: Arc<dyn SessionStore> = Arc::new(VersionedSessionStore::in_memory(Duration::minutes(10)));
        let catalog = Arc::new(InMemoryCatalog::new(vec![(tenant, menu)]));
        let sink = Arc::new(sink);
        let llm = Arc::new(llm);
        let orchestrator = ResponseOrchestrator::new(
            llm.clone() as Arc<dyn LlmClient>,
            Arc::new(PromptBuilder::new(10).expect("templates")),
            Arc::new(RubricEvaluator::default()),
            Arc::new(LearningLog::default()),
            OrchestratorSettings {
                timeout: std::time::Duration::from_millis(500),
                ..OrchestratorSettings::default()
            },
        );
        let runtime = ConversationRuntime::builder(RuntimeDeps {
            tenants: catalog.clone(),
            menus: catalog,
            sessions: sessions.clone(),
            orders: sink.clone() as Arc<dyn OrderSink>,
        })
        .orchestrator(orchestrator)
        .build()
        .expect("runtime");
        Harness { runtime, sessions, sink, llm }
    }

    fn harness(llm: ScriptedLlm) -> Harness {
        harness_with(TenantConfig::new("bistro", "Bistro"), burger_menu(), RecordingSink::default(), llm)
    }

    impl Harness {
        async fn say(&self, text: &str) -> ordermate_core::domain::message::OutboundReply {
            self.runtime
                .handle_message(InboundMessage::new("bistro", "u1", text))
                .await
                .expect("reply")
        }

        async fn session(&self) -> ordermate_core::domain::session::Session {
            self.sessions.load(&SessionKey::new("bistro", "u1")).await
        }

        async fn seed_history(&self, messages: Vec<Message>) {
            let apply = move |session: &mut ordermate_core::domain::session::Session| {
                session.history.extend(messages.iter().cloned());
            };
            self.sessions.save(&SessionKey::new("bistro", "u1"), &apply).await.expect("seed");
        }
    }

    fn burger() -> MenuItemId {
        MenuItemId("burger".to_string())
    }

    fn fries() -> MenuItemId {
        MenuItemId("fries".to_string())
    }

    #[tokio::test]
    async fn quantities_from_one_message_build_the_cart() {
        let harness = harness(ScriptedLlm::default());

        let reply = harness.say("2 burgers and 1 fries").await;

        assert_eq!(reply.intent, ReplyIntent::AddToCart);
        assert_eq!(reply.cart_snapshot.item_count, 3);
        let session = harness.session().await;
        assert_eq!(session.cart.quantity_of(&burger()), 2);
        assert_eq!(session.cart.quantity_of(&fries()), 1);
        assert_eq!(session.cart.total(), Decimal::new(250, 0));
        assert_eq!(session.dialogue_state, DialogueState::ItemSelection);
        assert!(session.history[0].applied_to_cart);
        assert_eq!(harness.llm.calls(), 0);
    }

    #[tokio::test]
    async fn per_item_quantity_is_the_sum_of_resolved_additions() {
        let harness = harness(ScriptedLlm::default());

        for text in ["2 burgers", "3 fries", "1 burger and 2 pizzas", "two fries"] {
            harness.say(text).await;
        }

        let session = harness.session().await;
        assert_eq!(session.cart.quantity_of(&burger()), 3);
        assert_eq!(session.cart.quantity_of(&fries()), 5);
    }

    #[tokio::test]
    async fn total_query_is_read_only() {
        let harness = harness(ScriptedLlm::default());
        harness.say("2 burgers and 1 fries").await;
        let before = harness.session().await.cart;

        let reply = harness.say("what is my total").await;

        assert!(reply.reply_text.contains("Rs.250"), "{}", reply.reply_text);
        assert_eq!(harness.session().await.cart, before);
    }

    #[tokio::test]
    async fn checkout_places_one_order_then_clears_the_cart() {
        let harness = harness(ScriptedLlm::default());
        harness.say("2 burgers and 1 fries").await;

        let reply = harness.say("checkout").await;

        assert_eq!(reply.intent, ReplyIntent::Confirm);
        assert!(reply.reply_text.contains("Total: Rs.250"));
        assert_eq!(reply.cart_snapshot.item_count, 0);
        let orders = harness.sink.placed();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, Decimal::new(250, 0));
        let session = harness.session().await;
        assert!(session.cart.is_empty());
        assert!(!session.awaiting_confirmation);
        assert_eq!(session.dialogue_state, DialogueState::OrderConfirmed);
    }

    #[tokio::test]
    async fn empty_cart_checkout_creates_no_order() {
        let harness = harness(ScriptedLlm::default());

        let first = harness.say("checkout").await;
        let second = harness.say("checkout").await;

        assert_eq!(first.reply_text, ordermate_core::replies::EMPTY_CART_CHECKOUT);
        assert_eq!(second.reply_text, ordermate_core::replies::EMPTY_CART_CHECKOUT);
        assert!(harness.sink.placed().is_empty());
        assert!(harness.session().await.cart.is_empty());
    }

    #[tokio::test]
    async fn failed_submission_keeps_the_cart_and_saves_nothing() {
        let harness = harness_with(
            TenantConfig::new("bistro", "Bistro"),
            burger_menu(),
            RecordingSink::failing(),
            ScriptedLlm::default(),
        );
        harness.say("1 fries").await;
        let before = harness.session().await;

        let reply = harness.say("checkout").await;

        assert_eq!(reply.intent, ReplyIntent::Error);
        let after = harness.session().await;
        assert_eq!(after.cart, before.cart);
        assert_eq!(after.history, before.history);
    }

    #[tokio::test]
    async fn bare_yes_after_a_recommendation_adds_the_recommended_item() {
        let harness = harness(ScriptedLlm::default());
        harness
            .seed_history(vec![
                Message::user("what do you recommend?"),
                Message::assistant("I'd recommend our Fries, they're crispy! Would you like to try them?"),
            ])
            .await;

        let reply = harness.say("yes").await;

        assert_eq!(reply.intent, ReplyIntent::AddToCart);
        assert_eq!(harness.session().await.cart.quantity_of(&fries()), 1);
    }

    #[tokio::test]
    async fn bare_yes_resolves_identically_from_identical_state() {
        let history = vec![
            Message::user("do you have fries?"),
            Message::assistant("Yes! How about our Fries?"),
        ];
        let first = harness(ScriptedLlm::default());
        let second = harness(ScriptedLlm::default());
        first.seed_history(history.clone()).await;
        second.seed_history(history).await;

        first.say("yes").await;
        second.say("yes").await;

        assert_eq!(first.session().await.cart, second.session().await.cart);
        assert!(!first.session().await.cart.is_empty());
    }

    #[tokio::test]
    async fn repeated_yes_never_re_adds_an_applied_request() {
        let harness = harness(ScriptedLlm::default());
        harness.say("2 burgers").await;

        let reply = harness.say("yes").await;

        assert_eq!(reply.intent, ReplyIntent::Clarify);
        assert_eq!(harness.session().await.cart.quantity_of(&burger()), 2);
    }

    #[tokio::test]
    async fn yes_to_a_checkout_question_places_the_order() {
        let harness = harness(ScriptedLlm::default());
        harness.say("1 burger").await;
        harness
            .seed_history(vec![
                Message::user("that's it"),
                Message::assistant("Shall I place your order now?"),
            ])
            .await;

        let reply = harness.say("yes").await;

        assert_eq!(reply.intent, ReplyIntent::Confirm);
        assert_eq!(harness.sink.placed().len(), 1);
        assert!(harness.session().await.cart.is_empty());
    }

    #[tokio::test]
    async fn every_checkout_phrasing_places_exactly_one_order() {
        for text in ["I want to checkout", "I'd like to place my order", "I'm done", "done", "finish", "that's all"] {
            let harness = harness(ScriptedLlm::replies(&[
                r#"{"reply_text":"Great, your order is confirmed!","intent":"confirm"}"#,
            ]));
            harness.say("2 burgers").await;

            let reply = harness.say(text).await;

            assert_eq!(reply.intent, ReplyIntent::Confirm, "{text}");
            assert_eq!(harness.sink.placed().len(), 1, "{text}");
            assert_eq!(reply.cart_snapshot.item_count, 0, "{text}");
            assert_eq!(harness.llm.calls(), 0, "{text}");
        }
    }

    #[tokio::test]
    async fn model_confirmation_goes_through_checkout() {
        let harness = harness(ScriptedLlm::replies(&[
            r#"{"reply_text":"Great, your order is confirmed!","intent":"confirm"}"#,
        ]));
        harness.say("1 burger").await;

        let reply = harness.say("wrap it up for me").await;

        assert_eq!(harness.llm.calls(), 1);
        assert_eq!(reply.intent, ReplyIntent::Confirm);
        assert_ne!(reply.reply_text, "Great, your order is confirmed!");
        assert_eq!(harness.sink.placed().len(), 1);
        assert!(harness.session().await.cart.is_empty());
    }

    #[tokio::test]
    async fn model_confirmation_with_an_empty_cart_places_nothing() {
        let harness = harness(ScriptedLlm::replies(&[
            r#"{"reply_text":"Great, your order is confirmed!","intent":"confirm"}"#,
        ]));

        let reply = harness.say("wrap it up for me").await;

        assert_eq!(reply.reply_text, ordermate_core::replies::EMPTY_CART_CHECKOUT);
        assert!(harness.sink.placed().is_empty());
    }

    #[tokio::test]
    async fn bare_yes_prefers_the_fresh_recommendation_over_an_old_question() {
        let harness = harness(ScriptedLlm::default());
        harness
            .seed_history(vec![
                Message::user("is the burger spicy?"),
                Message::assistant("Not at all, it's mild."),
                Message::user("what else is good?"),
                Message::assistant("I'd recommend our Fries, they're crispy! Would you like to try them?"),
            ])
            .await;

        harness.say("yes").await;

        let session = harness.session().await;
        assert_eq!(session.cart.quantity_of(&fries()), 1);
        assert_eq!(session.cart.quantity_of(&burger()), 0);
    }

    #[tokio::test]
    async fn model_reply_claiming_an_empty_cart_is_repaired() {
        let harness = harness(ScriptedLlm::replies(&[
            r#"{"reply_text":"Your cart is empty right now.","intent":"info"}"#,
            r#"{"reply_text":"Looks like your cart is empty!","intent":"info"}"#,
        ]));
        harness.say("1 fries").await;

        let reply = harness.say("did I order anything yet?").await;

        assert!(!reply.reply_text.to_lowercase().contains("cart is empty"), "{}", reply.reply_text);
        assert!(reply.reply_text.contains("1 x Fries"));
        assert_eq!(harness.session().await.cart.quantity_of(&fries()), 1);
    }

    #[tokio::test]
    async fn model_proposals_go_through_the_cart_engine() {
        let harness = harness(ScriptedLlm::replies(&[
            r#"{"reply_text":"Added a Burger for you!","intent":"add_to_cart","orderItems":[{"title":"Burger","qty":1}]}"#,
        ]));

        let reply = harness.say("I'm starving, surprise me with something meaty").await;

        assert_eq!(reply.intent, ReplyIntent::AddToCart);
        let session = harness.session().await;
        assert_eq!(session.cart.quantity_of(&burger()), 1);
        assert_eq!(session.cart.lines.len(), 1);
        assert!(session.history[0].applied_to_cart);
    }

    #[tokio::test]
    async fn generation_failure_apologises_and_saves_nothing() {
        let harness = harness(ScriptedLlm::default());

        let reply = harness.say("do you deliver to the harbour?").await;

        assert_eq!(reply.intent, ReplyIntent::Error);
        assert_eq!(reply.reply_text, ordermate_core::replies::GENERATION_APOLOGY);
        assert!(harness.session().await.history.is_empty());
    }

    #[tokio::test]
    async fn deterministic_tenants_never_call_the_model() {
        let mut tenant = TenantConfig::new("bistro", "Bistro");
        tenant.assistant_mode = AssistantMode::DeterministicOnly;
        let harness = harness_with(tenant, burger_menu(), RecordingSink::default(), ScriptedLlm::default());

        let reply = harness.say("is the burger spicy?").await;

        assert_eq!(reply.intent, ReplyIntent::Clarify);
        assert_eq!(harness.llm.calls(), 0);
    }

    #[tokio::test]
    async fn blank_messages_are_ignored_without_a_save() {
        let harness = harness(ScriptedLlm::default());

        let reply = harness.say("   ").await;

        assert_eq!(reply.intent, ReplyIntent::Ignored);
        assert!(reply.reply_text.is_empty());
        assert!(harness.session().await.history.is_empty());
    }

    #[tokio::test]
    async fn bad_requests_and_unknown_tenants_are_errors() {
        let harness = harness(ScriptedLlm::default());

        let missing_user = harness.runtime.handle_message(InboundMessage::new("bistro", " ", "hi")).await;
        let unknown = harness.runtime.handle_message(InboundMessage::new("nowhere", "u1", "hi")).await;

        assert!(matches!(missing_user, Err(ConversationError::Validation(ValidationError::MissingUser))));
        assert!(matches!(unknown, Err(ConversationError::Lookup(LookupError::UnknownTenant(_)))));
    }

    #[tokio::test]
    async fn cart_queries_never_report_a_non_empty_cart_as_empty() {
        let harness = harness(ScriptedLlm::default());
        harness.say("1 burger").await;

        for text in ["what's in my cart", "checkout"] {
            let reply = harness.say(text).await;
            assert!(!reply.reply_text.to_lowercase().contains("cart is empty"), "{text}");
        }
    }
}
