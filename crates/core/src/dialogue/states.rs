use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Greeting,
    MenuExploration,
    ItemSelection,
    CartReview,
    CheckoutConfirmation,
    OrderConfirmed,
    ErrorRecovery,
}

impl DialogueState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::MenuExploration => "menu_exploration",
            Self::ItemSelection => "item_selection",
            Self::CartReview => "cart_review",
            Self::CheckoutConfirmation => "checkout_confirmation",
            Self::OrderConfirmed => "order_confirmed",
            Self::ErrorRecovery => "error_recovery",
        }
    }
}

/// What the previous assistant turn asked or offered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssistantCue {
    CheckoutQuestion,
    AddMoreQuestion,
    Recommendation,
    MenuListing,
    None,
}

/// Coarse reading of the current user text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCue {
    Affirm,
    Decline,
    Checkout,
    MenuRequest,
    Items,
    CartQuery,
    Greeting,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DialogueSignals {
    pub previous_assistant_cue: AssistantCue,
    pub user_cue: UserCue,
    pub cart_empty: bool,
}

/// How a turn ended, folded back into the state after the pipeline runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied,
    ItemsAdded,
    OrderPlaced,
    CheckoutRejectedEmpty,
    Degraded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DialogueTransition {
    pub from: DialogueState,
    pub to: DialogueState,
    pub signals: DialogueSignals,
}

impl DialogueTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}
