use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::dialogue::states::{
    AssistantCue, DialogueSignals, DialogueState, DialogueTransition, TurnOutcome, UserCue,
};
use crate::domain::session::Session;

const CHECKOUT_QUESTION: &str = r"proceed to check ?out|ready to (check ?out|order)|place (your|the) order|confirm (your|the) order|shall i (place|confirm)|check ?out\?";
const ADD_MORE_QUESTION: &str = r"anything else|something else|add (anything|something) (else|more)|(anything|something) more";
const RECOMMENDATION: &str = r"recommend|would you like to (try|add)|want to try|like to add|try our|perfect (side|pairing|match)|how about|goes (great|well) with|pair (it |that )?with";
const MENU_LISTING: &str = r"our menu|here('s| is) (the|our) menu|we (have|serve|offer)";

const USER_CHECKOUT: &str = r"\b(check ?out|place (my |the )?order|confirm)\b";
const USER_DECLINE: &str = r"^(no|nope|nah|not now|nothing|that'?s (all|it)|i'?m (good|done)|that will be all)\b";
const USER_ITEMS: &str = r"\b(\d+|one|two|three|four|five|six|seven|eight|nine|ten)\s+[a-z]";
const USER_AFFIRM: &str = r"^(yes|yeah|yep|yup|sure|ok|okay|alright|please|go ahead|sounds good)\b";
const USER_CART_QUERY: &str = r"\b(cart|basket|my order|total|bill|how much)\b";
const USER_MENU_REQUEST: &str = r"\b(menu|what do you (have|serve|sell)|options)\b";
const USER_GREETING: &str = r"^(hi+|hello|hey|salaam?|good (morning|afternoon|evening))\b";

/// Advisory dialogue phase tracker.
///
/// The state only biases disambiguation and prompt context; cart and reply
/// invariants are enforced elsewhere regardless of what it says.
#[derive(Clone, Debug)]
pub struct DialogueMachine {
    checkout_question: Regex,
    add_more_question: Regex,
    recommendation: Regex,
    menu_listing: Regex,
    user_cues: Vec<(UserCue, Regex)>,
}

impl DialogueMachine {
    pub fn new() -> Result<Self, regex::Error> {
        let user_cues = [
            (UserCue::Checkout, USER_CHECKOUT),
            (UserCue::Decline, USER_DECLINE),
            (UserCue::Items, USER_ITEMS),
            (UserCue::Affirm, USER_AFFIRM),
            (UserCue::CartQuery, USER_CART_QUERY),
            (UserCue::MenuRequest, USER_MENU_REQUEST),
            (UserCue::Greeting, USER_GREETING),
        ]
        .into_iter()
        .map(|(cue, pattern)| insensitive(pattern).map(|regex| (cue, regex)))
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            checkout_question: insensitive(CHECKOUT_QUESTION)?,
            add_more_question: insensitive(ADD_MORE_QUESTION)?,
            recommendation: insensitive(RECOMMENDATION)?,
            menu_listing: insensitive(MENU_LISTING)?,
            user_cues,
        })
    }

    pub fn assistant_cue(&self, text: &str) -> AssistantCue {
        let asks_checkout = self.checkout_question.is_match(text);
        let asks_more = self.add_more_question.is_match(text);

        // "add anything else or proceed to checkout?" is not a checkout question.
        if asks_checkout && !asks_more {
            return AssistantCue::CheckoutQuestion;
        }
        if asks_more {
            return AssistantCue::AddMoreQuestion;
        }
        if self.recommendation.is_match(text) {
            return AssistantCue::Recommendation;
        }
        if self.menu_listing.is_match(text) {
            return AssistantCue::MenuListing;
        }
        AssistantCue::None
    }

    pub fn user_cue(&self, text: &str) -> UserCue {
        let trimmed = text.trim();
        self.user_cues
            .iter()
            .find(|(_, pattern)| pattern.is_match(trimmed))
            .map_or(UserCue::Other, |(cue, _)| *cue)
    }

    pub fn signals(&self, session: &Session, text: &str) -> DialogueSignals {
        DialogueSignals {
            previous_assistant_cue: session
                .previous_assistant_message()
                .map_or(AssistantCue::None, |message| self.assistant_cue(&message.content)),
            user_cue: self.user_cue(text),
            cart_empty: session.cart.is_empty(),
        }
    }

    pub fn advance(&self, current: DialogueState, signals: DialogueSignals) -> DialogueTransition {
        let to = transition(current, &signals);
        if to != current {
            debug!(
                event_name = "dialogue.transition",
                from = current.as_str(),
                to = to.as_str(),
                "dialogue state advanced"
            );
        }
        DialogueTransition { from: current, to, signals }
    }

    pub fn observe(&self, session: &Session, text: &str) -> DialogueTransition {
        self.advance(session.dialogue_state, self.signals(session, text))
    }

    pub fn settle(&self, state: DialogueState, outcome: TurnOutcome) -> DialogueState {
        match outcome {
            TurnOutcome::OrderPlaced => DialogueState::OrderConfirmed,
            TurnOutcome::CheckoutRejectedEmpty => DialogueState::MenuExploration,
            TurnOutcome::Degraded => DialogueState::ErrorRecovery,
            TurnOutcome::ItemsAdded => DialogueState::ItemSelection,
            TurnOutcome::Replied => state,
        }
    }
}

pub fn context_hint(state: DialogueState) -> &'static str {
    match state {
        DialogueState::Greeting => {
            "The customer just arrived. Welcome them briefly and offer the menu."
        }
        DialogueState::MenuExploration => {
            "The customer is browsing. Describe menu items accurately and suggest one popular item."
        }
        DialogueState::ItemSelection => {
            "The customer is choosing items. Confirm what was added and ask if they want anything else."
        }
        DialogueState::CartReview => {
            "The customer is reviewing the cart. Summarise it exactly and ask whether to place the order."
        }
        DialogueState::CheckoutConfirmation => {
            "The customer is about to check out. Do not propose new items; confirm the order."
        }
        DialogueState::OrderConfirmed => {
            "The last order was placed. Thank the customer and offer help with a new order."
        }
        DialogueState::ErrorRecovery => {
            "The previous reply failed. Apologise briefly and restate the cart before continuing."
        }
    }
}

fn transition(current: DialogueState, signals: &DialogueSignals) -> DialogueState {
    use AssistantCue::{AddMoreQuestion, CheckoutQuestion, Recommendation};
    use DialogueState::{
        CartReview, CheckoutConfirmation, ErrorRecovery, Greeting, ItemSelection, MenuExploration,
        OrderConfirmed,
    };
    use UserCue::{Affirm, CartQuery, Checkout, Decline, Items, MenuRequest, Other};

    match (current, signals.previous_assistant_cue, signals.user_cue, signals.cart_empty) {
        (_, CheckoutQuestion, Affirm, false) | (_, _, Checkout, false) => CheckoutConfirmation,
        (_, CheckoutQuestion, Affirm, true) | (_, _, Checkout, true) => MenuExploration,
        (CheckoutConfirmation, _, Decline, false) => CartReview,
        (_, AddMoreQuestion | Recommendation, Decline, false) => CartReview,
        (_, AddMoreQuestion | Recommendation, Decline, true) => MenuExploration,
        (_, AddMoreQuestion | Recommendation, Affirm, _) => ItemSelection,
        (_, _, Items, _) => ItemSelection,
        (_, _, MenuRequest, _) => MenuExploration,
        (_, _, CartQuery, _) => CartReview,
        (_, _, UserCue::Greeting, true) => Greeting,
        (OrderConfirmed | ErrorRecovery, _, _, true) => MenuExploration,
        (ErrorRecovery, _, _, false) => ItemSelection,
        (Greeting, _, Other | Affirm, _) => MenuExploration,
        (state, _, _, _) => state,
    }
}

fn insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}
