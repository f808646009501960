use ordermate_core::cart::{CartEngine, ProposedItem};
use ordermate_core::dialogue::DialogueState;
use ordermate_core::domain::cart::Addition;
use ordermate_core::domain::menu::Menu;

use crate::llm::DraftIntent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow(Addition),
    Deny { reason_code: &'static str, title: String },
}

/// What the guard knows about the turn a draft was written for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProposalContext {
    pub state: DialogueState,
    pub intent: DraftIntent,
    /// The customer's own message names items or quantities.
    pub user_named_items: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalPolicy {
    pub proposals_enabled: bool,
    pub block_during_checkout: bool,
}

impl Default for ProposalPolicy {
    fn default() -> Self {
        Self { proposals_enabled: true, block_during_checkout: true }
    }
}

impl ProposalPolicy {
    /// One decision per proposal, in draft order. A proposal that repeats an
    /// item already allowed from the same draft is denied.
    pub fn evaluate(
        &self,
        proposals: &[ProposedItem],
        menu: &Menu,
        engine: &CartEngine,
        context: ProposalContext,
    ) -> Vec<GuardrailDecision> {
        let mut allowed: Vec<Addition> = Vec::new();
        proposals
            .iter()
            .map(|proposal| {
                let deny = |reason_code| GuardrailDecision::Deny {
                    reason_code,
                    title: proposal.title.clone(),
                };
                if !self.proposals_enabled {
                    return deny("proposals_disabled");
                }
                if proposal.qty == 0 {
                    return deny("zero_quantity");
                }
                if context.intent != DraftIntent::AddToCart {
                    return deny("intent_not_add_to_cart");
                }
                if self.block_during_checkout
                    && matches!(
                        context.state,
                        DialogueState::CheckoutConfirmation | DialogueState::OrderConfirmed
                    )
                    && !context.user_named_items
                {
                    return deny("checkout_in_progress");
                }
                let Some(addition) =
                    engine.reconcile_proposals(std::slice::from_ref(proposal), menu).into_iter().next()
                else {
                    return deny("not_on_menu");
                };
                if allowed.iter().any(|existing| existing.item_id == addition.item_id) {
                    return deny("duplicate_in_draft");
                }
                allowed.push(addition.clone());
                GuardrailDecision::Allow(addition)
            })
            .collect()
    }

    pub fn accepted(
        &self,
        proposals: &[ProposedItem],
        menu: &Menu,
        engine: &CartEngine,
        context: ProposalContext,
    ) -> Vec<Addition> {
        self.evaluate(proposals, menu, engine, context)
            .into_iter()
            .filter_map(|decision| match decision {
                GuardrailDecision::Allow(addition) => Some(addition),
                GuardrailDecision::Deny { .. } => None,
            })
            .collect()
    }
}
