//! Token-level helpers shared by extraction and resolution.

pub const SEPARATOR: &str = ",";

const WORD_NUMBERS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

const ARTICLES: &[&str] = &["a", "an", "the", "some", "our", "your", "my"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantityToken {
    Numeric(Option<u32>),
    Word(u32),
}

/// Lowercases and splits on anything that is not alphanumeric. List
/// separators survive as their own `,` token; apostrophes are dropped so
/// `that's` becomes `thats`.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len() + 8);
    for character in text.chars().flat_map(char::to_lowercase) {
        if character.is_alphanumeric() {
            sanitized.push(character);
        } else if matches!(character, '\'' | '\u{2019}') {
            continue;
        } else if matches!(character, ',' | '&' | '+' | ';' | '\n') {
            sanitized.push_str(" , ");
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(str::to_string).collect()
}

pub fn quantity_token(token: &str) -> Option<QuantityToken> {
    let digits = token.strip_suffix('x').unwrap_or(token);
    if !digits.is_empty() && digits.chars().all(|character| character.is_ascii_digit()) {
        return Some(QuantityToken::Numeric(digits.parse::<u32>().ok()));
    }
    WORD_NUMBERS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, value)| QuantityToken::Word(*value))
}

/// Crude singular form so `burgers`/`burger` and `fries`/`fry` compare equal.
pub fn fold(word: &str) -> String {
    if word.len() > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Tokenized, folded, article-free words of a phrase.
pub fn folded_words(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|token| token != SEPARATOR && !ARTICLES.contains(&token.as_str()))
        .map(|token| fold(&token))
        .collect()
}

/// Start index of `needle` as a contiguous run inside `haystack`.
pub fn find_sequence(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

pub fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    find_sequence(haystack, needle).is_some()
}
