//! Resolution of ambiguous affirmatives ("yes", "ok", "sure").
//!
//! Each strategy is a pure function of (text, session, menu). The chain tries
//! them in a fixed priority order and the first one yielding items wins, so
//! the same session state always resolves a bare "yes" the same way.

use tracing::debug;

use crate::cart::extract::extract_requests;
use crate::cart::lexicon::tokenize;
use crate::cart::resolve::{resolve, MatchKind};
use crate::cart::merge_additions;
use crate::domain::cart::Addition;
use crate::domain::menu::Menu;
use crate::domain::session::Session;

const CONFIRMATION_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "ya", "sure", "ok", "okay", "alright", "please", "go", "ahead",
    "sounds", "good", "great", "perfect", "do", "it", "add", "that", "them", "those", "thanks",
    "thank", "you",
];
const CORE_CONFIRMATIONS: &[&str] =
    &["yes", "yeah", "yep", "yup", "ya", "sure", "ok", "okay", "alright", "go", "sounds", "add"];

const RECOMMENDATION_CUES: &[&str] = &[
    "recommend",
    "suggest",
    "would you like",
    "want to try",
    "like to add",
    "try our",
    "perfect side",
    "perfect pairing",
    "how about",
    "goes great with",
    "goes well with",
    "pair it with",
    "why not add",
];
const REPORT_CUES: &[&str] = &["added", "your cart", "in the cart", "your order", "total"];
const ALL_ITEMS_CUES: &[&str] =
    &["all items", "all the items", "everything on the menu", "whole menu", "entire menu"];
const SUMMARY_MARKERS: &[&str] = &["total:", "your current order", "your cart currently contains"];
const CONTROL_WORDS: &[&str] = &["total", "bill", "checkout", "menu", "cart"];

/// `yes`, `ok sure`, `yes please add it` but not `yes 2 fries`.
pub fn is_bare_confirmation(text: &str) -> bool {
    let tokens = tokenize(text);
    !tokens.is_empty()
        && tokens.iter().all(|token| token == "," || CONFIRMATION_WORDS.contains(&token.as_str()))
        && tokens.iter().any(|token| CORE_CONFIRMATIONS.contains(&token.as_str()))
}

pub trait AffirmativeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, text: &str, session: &Session, menu: &Menu) -> Option<Vec<Addition>>;
}

/// (a) The affirmative itself names items: "yes, 2 fries".
#[derive(Clone, Debug, Default)]
pub struct CurrentMessage;

impl AffirmativeStrategy for CurrentMessage {
    fn name(&self) -> &'static str {
        "current_message"
    }

    fn resolve(&self, text: &str, _session: &Session, menu: &Menu) -> Option<Vec<Addition>> {
        non_empty(additions_from(text, menu, &[]))
    }
}

/// (b) A bare confirmation picks up the latest substantive user turn, if it
/// carried items. Only that one turn is considered, and one that already
/// landed in the cart yields nothing.
#[derive(Clone, Debug, Default)]
pub struct PriorUserRequest;

impl AffirmativeStrategy for PriorUserRequest {
    fn name(&self) -> &'static str {
        "prior_user_request"
    }

    fn resolve(&self, text: &str, session: &Session, menu: &Menu) -> Option<Vec<Addition>> {
        if !is_bare_confirmation(text) {
            return None;
        }
        let after_summary = session.previous_assistant_message().is_some_and(|message| {
            let content = message.content.to_lowercase();
            SUMMARY_MARKERS.iter().any(|marker| content.contains(marker))
        });
        if after_summary {
            return None;
        }

        let latest = session.user_messages_newest_first().find(|message| {
            message.applied_to_cart
                || !(is_bare_confirmation(&message.content) || is_control_request(&message.content))
        })?;
        if latest.applied_to_cart {
            return None;
        }
        non_empty(additions_from(&latest.content, menu, &[]))
    }
}

/// (c) The previous assistant turn recommended specific items, or offered
/// the whole menu.
#[derive(Clone, Debug, Default)]
pub struct AssistantRecommendation;

impl AffirmativeStrategy for AssistantRecommendation {
    fn name(&self) -> &'static str {
        "assistant_recommendation"
    }

    fn resolve(&self, _text: &str, session: &Session, menu: &Menu) -> Option<Vec<Addition>> {
        let previous = session.previous_assistant_message()?;
        let mut additions = Vec::new();

        for sentence in sentences(&previous.content) {
            let lowered = sentence.to_lowercase();
            let recommends = RECOMMENDATION_CUES.iter().any(|cue| lowered.contains(cue));
            let reports = REPORT_CUES.iter().any(|cue| lowered.contains(cue));
            if !recommends || reports {
                continue;
            }
            if offers_whole_menu(&lowered) {
                return non_empty(
                    menu.items.iter().map(|item| Addition::from_item(item, 1)).collect(),
                );
            }
            additions.extend(additions_from(
                sentence,
                menu,
                &[MatchKind::Title, MatchKind::Alias, MatchKind::Keyword],
            ));
        }
        non_empty(merge_additions(additions))
    }
}

/// (d) Items the assistant suggested earlier, cached on the session.
#[derive(Clone, Debug, Default)]
pub struct LastSuggested;

impl AffirmativeStrategy for LastSuggested {
    fn name(&self) -> &'static str {
        "last_suggested"
    }

    fn resolve(&self, text: &str, session: &Session, menu: &Menu) -> Option<Vec<Addition>> {
        if !is_bare_confirmation(text) {
            return None;
        }
        non_empty(
            session
                .last_suggested
                .iter()
                .filter_map(|id| menu.get(id))
                .map(|item| Addition::from_item(item, 1))
                .collect(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AffirmativeResolution {
    pub strategy: &'static str,
    pub additions: Vec<Addition>,
}

pub struct AffirmativeChain {
    strategies: Vec<Box<dyn AffirmativeStrategy>>,
}

impl Default for AffirmativeChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(CurrentMessage),
            Box::new(PriorUserRequest),
            Box::new(AssistantRecommendation),
            Box::new(LastSuggested),
        ])
    }
}

impl AffirmativeChain {
    pub fn new(strategies: Vec<Box<dyn AffirmativeStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn resolve(
        &self,
        text: &str,
        session: &Session,
        menu: &Menu,
    ) -> Option<AffirmativeResolution> {
        self.strategies.iter().find_map(|strategy| {
            let additions = strategy.resolve(text, session, menu)?;
            debug!(
                event_name = "cart.affirmative.resolved",
                strategy = strategy.name(),
                items = additions.len(),
                "affirmative resolved"
            );
            Some(AffirmativeResolution { strategy: strategy.name(), additions })
        })
    }
}

impl std::fmt::Debug for AffirmativeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffirmativeChain").field("strategies", &self.strategy_names()).finish()
    }
}

/// Extract + resolve, optionally restricted to some match kinds (empty = any).
fn additions_from(text: &str, menu: &Menu, allowed: &[MatchKind]) -> Vec<Addition> {
    let additions = extract_requests(text, menu)
        .into_iter()
        .filter_map(|request| {
            let resolution = resolve(&request.phrase, menu)?;
            (allowed.is_empty() || allowed.contains(&resolution.kind))
                .then(|| Addition::from_item(resolution.item, request.qty))
        })
        .collect();
    merge_additions(additions)
}

fn non_empty(additions: Vec<Addition>) -> Option<Vec<Addition>> {
    (!additions.is_empty()).then_some(additions)
}

fn is_control_request(text: &str) -> bool {
    tokenize(text).iter().any(|token| CONTROL_WORDS.contains(&token.as_str()))
}

fn offers_whole_menu(lowered: &str) -> bool {
    if ALL_ITEMS_CUES.iter().any(|cue| lowered.contains(cue)) {
        return true;
    }
    let tokens = tokenize(lowered);
    tokens.iter().any(|token| token == "all") && tokens.iter().any(|token| token == "menu")
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(|character| matches!(character, '.' | '!' | '?' | '\n'))
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
}
