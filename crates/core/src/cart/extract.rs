use tracing::debug;

use crate::cart::lexicon::{find_sequence, fold, quantity_token, tokenize, QuantityToken, SEPARATOR};
use crate::domain::menu::Menu;

const MAX_PHRASE_WORDS: usize = 4;

/// Words between a quantity and the item name that carry no meaning.
const LEADING_FILLERS: &[&str] =
    &["x", "of", "more", "the", "extra", "order", "orders", "plate", "plates", "serving", "servings"];

/// Words that end an item phrase.
const BOUNDARIES: &[&str] = &[
    SEPARATOR, "and", "plus", "with", "also", "then", "please", "pls", "to", "into", "in", "for",
    "from", "thanks", "thank", "add",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestSource {
    Numeric,
    WordNumber,
    Title,
}

/// A quantity + raw item phrase found in user text, not yet resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemRequest {
    pub qty: u32,
    pub phrase: String,
    pub source: RequestSource,
    position: usize,
}

/// Scans `text` with the ordered patterns: numeric quantity + phrase,
/// word-number + phrase, then full menu titles not already covered (qty 1).
/// Requests come back in the order they appear in the text.
pub fn extract_requests(text: &str, menu: &Menu) -> Vec<ItemRequest> {
    let tokens = tokenize(text);
    let mut covered = vec![false; tokens.len()];
    let mut requests = Vec::new();

    let mut index = 0;
    while index < tokens.len() {
        let Some(quantity) = quantity_token(&tokens[index]) else {
            index += 1;
            continue;
        };

        let start = index;
        let mut cursor = index + 1;
        while cursor < tokens.len() && LEADING_FILLERS.contains(&tokens[cursor].as_str()) {
            cursor += 1;
        }
        let mut phrase = Vec::new();
        while cursor < tokens.len()
            && phrase.len() < MAX_PHRASE_WORDS
            && !BOUNDARIES.contains(&tokens[cursor].as_str())
            && quantity_token(&tokens[cursor]).is_none()
        {
            phrase.push(tokens[cursor].as_str());
            cursor += 1;
        }
        covered[start..cursor].iter_mut().for_each(|slot| *slot = true);
        index = cursor;

        let (qty, source) = match quantity {
            QuantityToken::Numeric(Some(qty)) => (qty, RequestSource::Numeric),
            QuantityToken::Word(qty) => (qty, RequestSource::WordNumber),
            QuantityToken::Numeric(None) => {
                debug!(event_name = "cart.extract.quantity_unparsable", "dropping quantity");
                continue;
            }
        };
        if qty == 0 || phrase.is_empty() {
            continue;
        }
        requests.push(ItemRequest { qty, phrase: phrase.join(" "), source, position: start });
    }

    let folded = tokens.iter().map(|token| fold(token)).collect::<Vec<_>>();
    let mut titles = menu
        .items
        .iter()
        .map(|item| (item, tokenize(&item.title).iter().map(|word| fold(word)).collect::<Vec<_>>()))
        .filter(|(_, words)| !words.is_empty())
        .collect::<Vec<_>>();
    // Longer titles claim their words first.
    titles.sort_by(|left, right| right.1.len().cmp(&left.1.len()));

    for (item, words) in titles {
        let mut offset = 0;
        while let Some(found) = find_sequence(&folded[offset..], &words) {
            let start = offset + found;
            let end = start + words.len();
            if covered[start..end].iter().all(|slot| !slot) {
                covered[start..end].iter_mut().for_each(|slot| *slot = true);
                requests.push(ItemRequest {
                    qty: 1,
                    phrase: item.title.to_lowercase(),
                    source: RequestSource::Title,
                    position: start,
                });
            }
            offset = end;
        }
    }

    requests.sort_by_key(|request| request.position);
    requests
}

/// True when the text carries an explicit quantity word or number.
pub fn has_quantity(text: &str) -> bool {
    tokenize(text).iter().any(|token| quantity_token(token).is_some())
}
