use crate::cart::lexicon::{contains_sequence, folded_words};
use crate::domain::menu::{Menu, MenuItem};

/// Title words too generic to identify a single item on their own.
const GENERIC_WORDS: &[&str] = &["with", "and", "special", "classic", "regular", "large", "small"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Title,
    Alias,
    Keyword,
    Category,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution<'m> {
    pub item: &'m MenuItem,
    pub kind: MatchKind,
}

/// Maps a raw phrase to one menu item, trying full-title containment, then
/// aliases and distinctive title keywords, then category tags.
pub fn resolve<'m>(phrase: &str, menu: &'m Menu) -> Option<Resolution<'m>> {
    let words = folded_words(phrase);
    if words.is_empty() {
        return None;
    }

    by_title(&words, menu)
        .map(|item| Resolution { item, kind: MatchKind::Title })
        .or_else(|| by_alias(&words, menu).map(|item| Resolution { item, kind: MatchKind::Alias }))
        .or_else(|| {
            by_keyword(&words, menu).map(|item| Resolution { item, kind: MatchKind::Keyword })
        })
        .or_else(|| {
            by_category(&words, menu).map(|item| Resolution { item, kind: MatchKind::Category })
        })
}

fn by_title<'m>(words: &[String], menu: &'m Menu) -> Option<&'m MenuItem> {
    let titled = menu.items.iter().map(|item| (item, folded_words(&item.title)));

    // Phrase mentions a whole title: prefer the most specific one.
    let mut best: Option<(&MenuItem, usize)> = None;
    for (item, title) in titled.clone() {
        if contains_sequence(words, &title) && best.map_or(true, |(_, len)| title.len() > len) {
            best = Some((item, title.len()));
        }
    }
    if let Some((item, _)) = best {
        return Some(item);
    }

    // Phrase is a fragment of a title, e.g. "melt burger".
    titled.into_iter().find(|(_, title)| contains_sequence(title, words)).map(|(item, _)| item)
}

fn by_alias<'m>(words: &[String], menu: &'m Menu) -> Option<&'m MenuItem> {
    menu.items.iter().find(|item| {
        item.aliases.iter().map(|alias| folded_words(alias)).any(|alias| {
            !alias.is_empty() && (contains_sequence(words, &alias) || contains_sequence(&alias, words))
        })
    })
}

fn by_keyword<'m>(words: &[String], menu: &'m Menu) -> Option<&'m MenuItem> {
    let titles = menu.items.iter().map(|item| (item, folded_words(&item.title))).collect::<Vec<_>>();
    words.iter().filter(|word| word.len() >= 3 && !GENERIC_WORDS.contains(&word.as_str())).find_map(
        |word| {
            let mut owners = titles.iter().filter(|(_, title)| title.contains(word));
            match (owners.next(), owners.next()) {
                (Some((item, _)), None) => Some(*item),
                _ => None,
            }
        },
    )
}

fn by_category<'m>(words: &[String], menu: &'m Menu) -> Option<&'m MenuItem> {
    words.iter().find_map(|word| {
        menu.items.iter().find(|item| item.tags.iter().any(|tag| folded_words(tag) == [word.clone()]))
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{resolve, MatchKind};
    use crate::domain::menu::{Menu, MenuItem};
    use crate::domain::tenant::TenantId;

    fn menu() -> Menu {
        Menu::new(
            TenantId("bistro".to_string()),
            vec![
                MenuItem::new("melt", "Truffle Melt Burger", Decimal::new(1850, 0))
                    .with_tags(&["bestseller", "truffle"]),
                MenuItem::new("bbq", "Smoky BBQ Chicken", Decimal::new(1550, 0))
                    .with_tags(&["chicken", "smoky"]),
                MenuItem::new("fries", "Loaded Fries", Decimal::new(690, 0))
                    .with_tags(&["sides"])
                    .with_aliases(&["chips"]),
                MenuItem::new("burger", "Burger", Decimal::new(100, 0)),
            ],
        )
    }

    fn resolved(phrase: &str) -> Option<(String, MatchKind)> {
        let menu = menu();
        resolve(phrase, &menu).map(|found| (found.item.id.0.clone(), found.kind))
    }

    #[test]
    fn resolution_cases_follow_priority_order() {
        let cases = [
            ("truffle melt burgers", Some(("melt", MatchKind::Title))),
            ("burgers", Some(("burger", MatchKind::Title))),
            ("loaded fries please", Some(("fries", MatchKind::Title))),
            ("fries", Some(("fries", MatchKind::Title))),
            ("chips", Some(("fries", MatchKind::Alias))),
            ("bbq", Some(("bbq", MatchKind::Title))),
            ("truffle thing", Some(("melt", MatchKind::Keyword))),
            ("sides", Some(("fries", MatchKind::Category))),
            ("pizza", None),
            ("the", None),
        ];

        for (phrase, expected) in cases {
            let expected = expected.map(|(id, kind)| (id.to_string(), kind));
            assert_eq!(resolved(phrase), expected, "phrase `{phrase}`");
        }
    }
}
