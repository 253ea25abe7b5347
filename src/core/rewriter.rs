//! Prompt rewriting for `rewrite` verdicts.

use crate::api::Decision;
use crate::extract::FieldExtractor;
use crate::policy::DecisionType;
use std::collections::BTreeSet;
use std::ops::Range;

/// Human-readable phrases for blocked fields.
pub const FIELD_PHRASES: &[(&str, &str)] = &[
    ("address", "addresses"),
    ("phone", "contact details"),
    ("email", "electronic mail contacts"),
    ("EFN", "internal identifiers"),
    ("SSN", "government identifiers"),
    ("salary", "compensation details"),
];

/// Scope phrases narrowed by the rewrite, longest first so "all information"
/// is not partially consumed by "all info".
const BROAD_SCOPE_PHRASES: &[&str] = &["all information", "all info"];

const NARROWED_SCOPE: &str = "professional information";

/// Phrase for a field, falling back to the raw name.
pub fn field_phrase(field: &str) -> &str {
    FIELD_PHRASES
        .iter()
        .find(|(name, _)| *name == field)
        .map_or(field, |(_, phrase)| phrase)
}

/// Distinct phrases for the given fields, sorted and joined with ", ".
pub fn humanize_fields<'a>(fields: impl IntoIterator<Item = &'a String>) -> String {
    fields
        .into_iter()
        .map(|f| field_phrase(f))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Words that only qualify the mention after them.
const DETERMINERS: &[&str] = &["a", "an", "the", "their", "his", "her", "its", "any"];

/// Words joining list items.
const CONNECTIVES: &[&str] = &["and", "or", "plus", "&"];

/// Words that introduce a mention and dangle once it is gone.
const INTRODUCERS: &[&str] = &["with", "including", "plus", "and", "or", "of"];

/// Rewrite the prompt so it no longer asks for the blocked fields.
///
/// Mentions of blocked fields, as located by `extractor`, are removed along
/// with the list syntax around them. Broad scope phrases are then narrowed
/// and the exclusion clause appended. Returns the text unchanged unless the
/// decision is a rewrite with at least one blocked field.
pub fn rewrite_prompt(text: &str, decision: &Decision, extractor: &dyn FieldExtractor) -> String {
    if decision.action != DecisionType::Rewrite || decision.blocked_fields.is_empty() {
        return text.to_string();
    }

    let mentions = extractor.field_mentions(text, &decision.blocked_fields);
    let stripped = strip_mentions(text, &mentions);

    let narrowed = BROAD_SCOPE_PHRASES
        .iter()
        .fold(stripped, |acc, phrase| acc.replace(phrase, NARROWED_SCOPE));

    format!(
        "{}, excluding {}.",
        narrowed,
        humanize_fields(&decision.blocked_fields)
    )
}

/// Remove the given sorted, disjoint byte ranges from `text`.
fn strip_mentions(text: &str, mentions: &[Range<usize>]) -> String {
    if mentions.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    // Right to left keeps earlier ranges valid.
    for (i, mention) in mentions.iter().enumerate().rev() {
        let floor = if i == 0 { 0 } else { mentions[i - 1].end };
        let cut = removal_range(&out, mention.clone(), floor);
        out.replace_range(cut, " ");
    }

    let mut tidy = out.split_whitespace().collect::<Vec<_>>().join(" ");
    for punct in [",", ".", "?", "!", ";"] {
        tidy = tidy.replace(&format!(" {}", punct), punct);
    }
    while let Some((start, word)) = word_before(&tidy, tidy.len(), 0) {
        if !is_one_of(word, INTRODUCERS) && !is_one_of(word, DETERMINERS) {
            break;
        }
        tidy.truncate(tidy[..start].trim_end().len());
    }
    tidy.trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Widen a mention to the words that only exist to carry it.
fn removal_range(text: &str, mention: Range<usize>, floor: usize) -> Range<usize> {
    let qualified = skip_back(text, mention.start, floor, DETERMINERS);

    // "x, <mention>" or "x and <mention>": drop the joint with the item.
    if let Some(cut) = connective_before(text, qualified, floor) {
        return cut..mention.end;
    }
    // "<mention> and x": drop the mention and its joint, keep qualifiers.
    if let Some(stop) = connective_after(text, mention.end) {
        return mention.start..stop;
    }

    let cut = skip_back(text, qualified, floor, INTRODUCERS);
    let stop = match word_after(text, mention.end) {
        Some((stop, word)) if qualified < mention.start && word.eq_ignore_ascii_case("of") => stop,
        _ => mention.end,
    };
    cut..stop
}

fn connective_before(text: &str, pos: usize, floor: usize) -> Option<usize> {
    let head = text[floor..pos].trim_end();
    if head.ends_with(',') {
        return Some(floor + head.len() - 1);
    }
    let (start, word) = word_before(text, pos, floor)?;
    if !is_one_of(word, CONNECTIVES) {
        return None;
    }
    let head = text[floor..start].trim_end();
    Some(floor + head.strip_suffix(',').unwrap_or(head).len())
}

fn connective_after(text: &str, pos: usize) -> Option<usize> {
    let rest = text[pos..].trim_start();
    let mut at = text.len() - rest.len();
    let mut stop = None;
    if rest.starts_with(',') {
        at += 1;
        stop = Some(at);
    }
    if let Some((end, word)) = word_after(text, at) {
        if is_one_of(word, CONNECTIVES) {
            stop = Some(end);
        }
    }
    stop.map(|end| text.len() - text[end..].trim_start().len())
}

/// Move `pos` back over any run of `words`, never past `floor`.
fn skip_back(text: &str, mut pos: usize, floor: usize, words: &[&str]) -> usize {
    while let Some((start, word)) = word_before(text, pos, floor) {
        if !is_one_of(word, words) {
            break;
        }
        pos = start;
    }
    pos
}

/// The whitespace-delimited word ending before `pos`, with its start.
fn word_before(text: &str, pos: usize, floor: usize) -> Option<(usize, &str)> {
    let head = text[floor..pos].trim_end();
    let start = head.trim_end_matches(|c: char| !c.is_whitespace()).len();
    let word = &head[start..];
    (!word.is_empty()).then_some((floor + start, word))
}

/// The whitespace-delimited word starting after `pos`, with its end.
fn word_after(text: &str, pos: usize) -> Option<(usize, &str)> {
    let rest = text[pos..].trim_start();
    let offset = text.len() - rest.len();
    let len = rest.len() - rest.trim_start_matches(|c: char| !c.is_whitespace()).len();
    (len > 0).then_some((offset + len, &rest[..len]))
}

fn is_one_of(word: &str, words: &[&str]) -> bool {
    words.iter().any(|w| w.eq_ignore_ascii_case(word))
}
