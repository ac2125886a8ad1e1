//! Autocomplete hints synthesized from type-ahead results, and match
//! highlighting for rendered rows.
use crate::{
    markup::{decode_component, escape_regex},
    search::SearchResult,
};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TITLE_WEIGHT: f64 = 1.0;
const DESCRIPTION_WEIGHT: f64 = 0.7;
const MIN_SCORE: f64 = 1.8;

/// Piece of rendered text; `Strong` marks a word-start match of the search
/// word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Plain(String),
    Strong(String),
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain(t) | Segment::Strong(t) => t,
        }
    }
}

/// Split `text` around case-insensitive occurrences of `word`. Occurrences
/// inside a word stay plain.
pub fn highlight(text: &str, word: &str) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let lower: Vec<char> = chars.iter().map(|c| fold(*c)).collect();
    let needle: Vec<char> = word.chars().map(fold).collect();
    let mut segments = Vec::new();
    if needle.is_empty() {
        segments.push(Segment::Plain(text.to_string()));
        return segments;
    }
    let mut plain = String::new();
    let mut i = 0;
    while i < chars.len() {
        if lower[i..].starts_with(&needle) {
            let matched: String = chars[i..i + needle.len()].iter().collect();
            let at_word_start = i == 0 || !is_word_char(chars[i - 1]);
            if at_word_start {
                if !plain.is_empty() {
                    segments.push(Segment::Plain(std::mem::take(&mut plain)));
                }
                segments.push(Segment::Strong(matched));
            } else {
                plain.push_str(&matched);
            }
            i += needle.len();
        } else {
            plain.push(chars[i]);
            i += 1;
        }
    }
    if !plain.is_empty() || segments.is_empty() {
        segments.push(Segment::Plain(plain));
    }
    segments
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// One proposal row: the hint split where the typed word ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub text: String,
    pub typed: String,
    pub completion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Hints {
    /// Search field text extended by the best continuation.
    pub completion: Option<String>,
    pub proposals: Vec<Proposal>,
}

/// Matches the query word at a word start and captures the continuation:
/// the rest of that word, or the next word after non-word characters.
pub fn hint_pattern(key: &str) -> Option<Regex> {
    let word = key.split('&').next().unwrap_or_default();
    let word = decode_component(&word.replace('+', "%20"));
    if word.is_empty() {
        return None;
    }
    RegexBuilder::new(&format!(r"\b(?:{})((?:\w+|\W+\w+))", escape_regex(&word)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Score continuations found in titles and descriptions. Earlier results and
/// title matches weigh more; weak buckets are dropped. Nothing is proposed
/// once the typed word reaches `max_query_chars`.
pub fn synthesize(
    key: &str,
    typed: &str,
    word: &str,
    results: &[SearchResult],
    max_query_chars: usize,
    max_proposals: usize,
) -> Hints {
    let word_chars = word.chars().count();
    if results.is_empty() || word_chars >= max_query_chars {
        return Hints::default();
    }
    let Some(pattern) = hint_pattern(key) else {
        return Hints::default();
    };
    let n = results.len() as f64;
    let mut buckets: HashMap<String, f64> = HashMap::new();
    for (i, result) in results.iter().enumerate() {
        let rank = (n - i as f64) / n;
        for (field, weight) in [
            (&result.title, TITLE_WEIGHT),
            (&result.description, DESCRIPTION_WEIGHT),
        ] {
            if let Some(m) = pattern.find(field) {
                *buckets.entry(m.as_str().to_lowercase()).or_default() += (weight + rank) / n;
            }
        }
    }
    let mut ranked: Vec<(u64, String)> = buckets
        .into_iter()
        .filter(|(_, score)| *score >= MIN_SCORE / n)
        .map(|(hint, score)| ((score * 1e7).round() as u64, hint))
        .collect();
    ranked.sort_by(|a, b| b.cmp(a));

    let completion = ranked.first().and_then(|(_, hint)| {
        pattern
            .captures(hint)
            .and_then(|caps| caps.get(1))
            .map(|rest| format!("{typed}{}", rest.as_str()))
    });
    let proposals = ranked
        .iter()
        .take(max_proposals)
        .map(|(_, hint)| {
            let split = hint
                .char_indices()
                .nth(word_chars)
                .map(|(i, _)| i)
                .unwrap_or(hint.len());
            Proposal {
                text: hint.clone(),
                typed: hint[..split].to_string(),
                completion: hint[split..].to_string(),
            }
        })
        .collect();
    Hints {
        completion,
        proposals,
    }
}
