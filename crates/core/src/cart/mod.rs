//! Deterministic cart mutation: extraction, resolution, affirmative handling,
//! checkout and reconciliation of model-proposed items.

pub mod affirm;
pub mod checkout;
pub mod extract;
pub mod lexicon;
pub mod resolve;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use affirm::{is_bare_confirmation, AffirmativeChain, AffirmativeResolution, AffirmativeStrategy};
pub use checkout::CheckoutOutcome;
pub use extract::{extract_requests, has_quantity, ItemRequest, RequestSource};
pub use resolve::{resolve, MatchKind, Resolution};

use crate::domain::cart::{Addition, Cart};
use crate::domain::menu::Menu;
use crate::domain::session::Session;
use crate::ports::OrderSink;

/// An item the language model says it wants added. Untrusted until reconciled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedItem {
    pub title: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
}

fn default_qty() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartTotals {
    pub item_count: u32,
    pub total: Decimal,
    pub description: String,
}

#[derive(Debug)]
pub struct CartEngine {
    affirmatives: AffirmativeChain,
    submit_attempts: u32,
}

impl Default for CartEngine {
    fn default() -> Self {
        Self::new(2)
    }
}

impl CartEngine {
    pub fn new(submit_attempts: u32) -> Self {
        Self { affirmatives: AffirmativeChain::default(), submit_attempts }
    }

    pub fn with_chain(mut self, affirmatives: AffirmativeChain) -> Self {
        self.affirmatives = affirmatives;
        self
    }

    /// Extraction + resolution. Unresolved phrases are dropped.
    pub fn additions_from_text(&self, text: &str, menu: &Menu) -> Vec<Addition> {
        let additions = extract_requests(text, menu)
            .into_iter()
            .filter_map(|request| match resolve(&request.phrase, menu) {
                Some(resolution) => Some(Addition::from_item(resolution.item, request.qty)),
                None => {
                    debug!(
                        event_name = "cart.resolve.unmatched",
                        phrase = %request.phrase,
                        "dropping unresolved item phrase"
                    );
                    None
                }
            })
            .collect();
        merge_additions(additions)
    }

    pub fn resolve_affirmative(
        &self,
        text: &str,
        session: &Session,
        menu: &Menu,
    ) -> Option<AffirmativeResolution> {
        self.affirmatives.resolve(text, session, menu)
    }

    /// The single mutation path for both deterministic and proposed items.
    pub fn apply(&self, cart: &mut Cart, additions: &[Addition]) {
        for addition in additions {
            cart.add(addition);
        }
    }

    /// Read-only.
    pub fn totals(&self, cart: &Cart) -> CartTotals {
        CartTotals { item_count: cart.item_count(), total: cart.total(), description: cart.describe() }
    }

    pub async fn checkout(
        &self,
        session: &Session,
        sink: &dyn OrderSink,
        now: DateTime<Utc>,
    ) -> CheckoutOutcome {
        checkout::checkout(session, sink, self.submit_attempts, now).await
    }

    /// Accepts proposals only when they name a menu item by exact title,
    /// alias, or full-title containment.
    pub fn reconcile_proposals(&self, proposals: &[ProposedItem], menu: &Menu) -> Vec<Addition> {
        let additions = proposals
            .iter()
            .filter(|proposal| proposal.qty > 0)
            .filter_map(|proposal| {
                let item = menu.find_by_name(&proposal.title).or_else(|| {
                    resolve(&proposal.title, menu)
                        .filter(|resolution| resolution.kind == MatchKind::Title)
                        .map(|resolution| resolution.item)
                });
                if item.is_none() {
                    debug!(
                        event_name = "cart.reconcile.rejected",
                        title = %proposal.title,
                        "proposal does not match the menu"
                    );
                }
                item.map(|item| Addition::from_item(item, proposal.qty))
            })
            .collect();
        merge_additions(additions)
    }
}

/// Sums quantities per item, keeping first-seen order.
pub fn merge_additions(additions: Vec<Addition>) -> Vec<Addition> {
    let mut merged: Vec<Addition> = Vec::with_capacity(additions.len());
    for addition in additions {
        match merged.iter_mut().find(|existing| existing.item_id == addition.item_id) {
            Some(existing) => existing.qty = existing.qty.saturating_add(addition.qty),
            None => merged.push(addition),
        }
    }
    merged
}
