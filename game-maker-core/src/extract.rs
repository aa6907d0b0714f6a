//! Fact extraction from free-form model output.
//!
//! Two pure parsers live here:
//! - [`extract_book_fact`] pulls a `"Title" by Author` confirmation out of a
//!   stage agent's prose.
//! - [`extract_json`] finds the JSON object inside a structured-extraction
//!   reply that may be wrapped in markdown or chatter.
//!
//! Both are heuristics over text the model was asked, not forced, to format.

use crate::records::BookFact;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

/// Title fragments that mean an apostrophe was mistaken for an opening quote.
const FRAGMENT_DENYLIST: &[&str] = &["re talking about", "m so", "ve confirmed", "s that", "t that"];

/// Shortest title or author accepted.
const MIN_FACT_LEN: usize = 3;

/// Abbreviations whose period does not end an author name.
const HONORIFICS: &[&str] = &["Dr.", "Mr.", "Mrs.", "Ms.", "Jr.", "Sr.", "St."];

/// Lowercase words allowed inside an author name.
const NAME_PARTICLES: &[&str] = &["and", "de", "del", "der", "du", "la", "le", "van", "von"];

/// Phrases that introduce a confirmed title, most specific first.
const LEAD_INS: &[&str] = &[r"[Ii]s that\s+", r"talking about\s+", r"[Cc]onfirmed[^\n]*?", ""];

/// Quote styles as (open, body, close), tried in order.
const QUOTE_STYLES: &[(&str, &str, &str)] = &[
    ("\"", "[^\"\\n]+", "\""),
    ("“", "[^”\\n]+", "”"),
    ("['‘]", "[^'’\\n]+", "['’]"),
];

lazy_static! {
    static ref BOOK_PATTERNS: Vec<Regex> = LEAD_INS
        .iter()
        .flat_map(|lead| {
            QUOTE_STYLES.iter().map(move |(open, body, close)| {
                let pattern = format!(
                    r"{lead}{open}(?P<title>{body}){close}[^\n]*?\bby\s+(?P<author>[A-Z][^?!\n]*)"
                );
                Regex::new(&pattern).expect("book pattern is valid")
            })
        })
        .collect();
}

/// Extract a book title and author from an agent's confirmation message.
///
/// Patterns are tried in order (`Is that ...`, `talking about ...`,
/// `confirmed ...`, bare `"Title" by Author`) and each is tried with double,
/// curly and single quotes. The first candidate that passes validation wins.
pub fn extract_book_fact(text: &str) -> Option<BookFact> {
    BOOK_PATTERNS
        .iter()
        .find_map(|pattern| first_valid_candidate(pattern, text))
}

fn first_valid_candidate(pattern: &Regex, text: &str) -> Option<BookFact> {
    let mut start = 0;
    while start < text.len() {
        let caps = pattern.captures_at(text, start)?;
        let whole = caps.get(0)?;

        let title = clean_title(&caps["title"]);
        let author = clean_author(&caps["author"]);
        if is_plausible(&title, &author) {
            return Some(BookFact::new(title, author));
        }

        // Retry from the next character so a later quote can still match.
        let step = text[whole.start()..].chars().next().map_or(1, char::len_utf8);
        start = whole.start() + step;
    }
    None
}

fn is_plausible(title: &str, author: &str) -> bool {
    if title.chars().count() < MIN_FACT_LEN || author.chars().count() < MIN_FACT_LEN {
        return false;
    }
    if title.contains(['"', '“', '”']) {
        return false;
    }
    let lower = title.to_lowercase();
    !FRAGMENT_DENYLIST.iter().any(|fragment| lower.contains(fragment))
}

fn clean_title(raw: &str) -> String {
    raw.trim().trim_end_matches([',', '.']).trim().to_string()
}

/// Trim an author capture down to the name itself.
///
/// The capture runs to the end of the sentence, so stop at the first
/// character that cannot be part of a name, at a lowercase word that is not a
/// name particle, or at a period that ends the sentence rather than an
/// initial (`E.B.`) or honorific (`Dr.`).
fn clean_author(raw: &str) -> String {
    let name_chars: String = raw
        .chars()
        .take_while(|c| c.is_alphabetic() || matches!(c, ' ' | '.' | '-' | '\'' | '’'))
        .collect();

    let mut kept: Vec<&str> = Vec::new();
    for word in name_chars.split_whitespace() {
        let starts_lower = word.chars().next().is_some_and(char::is_lowercase);
        if starts_lower && !NAME_PARTICLES.contains(&word) {
            break;
        }
        if word.ends_with('.') && !is_initials(word) && !HONORIFICS.contains(&word) {
            kept.push(word.trim_end_matches('.'));
            break;
        }
        kept.push(word);
    }

    while kept.last().is_some_and(|w| NAME_PARTICLES.contains(w)) {
        kept.pop();
    }

    kept.join(" ")
}

/// `E.` or `E.B.`: uppercase letters each followed by a period.
fn is_initials(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    !chars.is_empty()
        && chars.len() % 2 == 0
        && chars
            .chunks(2)
            .all(|pair| pair[0].is_uppercase() && pair[1] == '.')
}

/// Extract the JSON object from a reply that might carry markdown or prose.
///
/// Tries, in order: a fenced code block holding an object, the first balanced
/// top-level `{...}` span, and finally the whole trimmed text.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(block) = fenced_block(text) {
        return block;
    }

    if let Some(span) = first_object_span(text) {
        return span;
    }

    text
}

/// Parse a structured-extraction reply into `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json(text))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let content_start = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = content_start.find("```")?;
    let block = content_start[..end].trim();
    block.starts_with('{').then_some(block)
}

fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
