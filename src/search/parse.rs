//! Result-row extraction from the server's search page.
//!
//! Each hit is a table row holding an icon cell and a cell with the topic
//! link (`href` and `title` attributes, both required, and the title text). An optional following
//! row carries a `class="location"` block of breadcrumb links, and one of the
//! next rows carries the `class="description"` text. Rows that do not fit
//! this shape are skipped.
use crate::{
    markup::decode_html,
    search::{Crumb, SearchResult},
};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static INDEXING: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"['"]divProgress['"]\s+STYLE\s*=\s*['"]\s*width\s*:\s*(\d+)\s*px"#)
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static ROW_HEAD: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<tr[^<]*<td[^<]*<img[^<]*</td[^<]*<td[^<]*<a\s+([^>]*)>([^<]*)</a>")
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});
static ROW_END: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"</tr")
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static LOCATION_START: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"class="location">"#)
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static LOCATION_END: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"</div")
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"\sclass=["']description["'][^>]*>([^<]*)"#)
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static BREADCRUMB: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"<a\s+href="([^"]+)">([^<]+)</a>"#)
        .case_insensitive(true)
        .build()
        .expect("static regex")
});

const TOPIC_PREFIX: &str = "../topic";

/// A parsed search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPage {
    /// The index is still being built; the value is the progress percentage.
    Indexing(u32),
    Results {
        results: Vec<SearchResult>,
        has_breadcrumbs: bool,
    },
}

pub fn indexing_progress(html: &str) -> Option<u32> {
    INDEXING
        .captures(html)
        .and_then(|caps| caps[1].parse().ok())
}

pub fn parse_search_page(html: &str) -> SearchPage {
    if let Some(progress) = indexing_progress(html) {
        return SearchPage::Indexing(progress);
    }
    let (results, has_breadcrumbs) = parse_results(html);
    SearchPage::Results {
        results,
        has_breadcrumbs,
    }
}

/// All well-formed rows, in page order, and whether any of them came with a
/// breadcrumb location.
pub fn parse_results(html: &str) -> (Vec<SearchResult>, bool) {
    let heads: Vec<_> = ROW_HEAD.captures_iter(html).collect();
    let mut results = Vec::new();
    let mut has_breadcrumbs = false;
    for (i, caps) in heads.iter().enumerate() {
        let (Some(head), Some(attrs), Some(text)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let tail_end = heads
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let tail = &html[head.end()..tail_end];
        match parse_row(attrs.as_str(), text.as_str(), tail) {
            Some((result, with_location)) => {
                has_breadcrumbs |= with_location;
                results.push(result);
            }
            None => tracing::trace!("[Search] Skipping malformed result row {}", i),
        }
    }
    (results, has_breadcrumbs)
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (caps[1].to_ascii_lowercase(), decode_html(value))
        })
        .collect()
}

fn location_block(segment: &str) -> Option<&str> {
    let start = LOCATION_START.find(segment)?.end();
    let rest = &segment[start..];
    let end = LOCATION_END.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_row(attrs: &str, text: &str, tail: &str) -> Option<(SearchResult, bool)> {
    let attrs = attributes(attrs);
    let href = attrs.get("href")?;
    let book = attrs.get("title")?;
    let segments: Vec<&str> = ROW_END.split(tail).collect();
    let location = segments.get(1).and_then(|segment| location_block(segment));
    let search_from = if location.is_some() { 2 } else { 1 };
    let description = segments
        .iter()
        .skip(search_from)
        .take(2)
        .find_map(|segment| DESCRIPTION.captures(segment))
        .map(|caps| decode_html(&caps[1]))?;
    let title = decode_html(text);
    let breadcrumb = match location {
        Some(location) => BREADCRUMB
            .captures_iter(location)
            .map(|caps| Crumb {
                href: Some(decode_html(&caps[1])),
                label: decode_html(&caps[2]),
            })
            .collect(),
        None => vec![Crumb {
            href: None,
            label: book.clone(),
        }],
    };
    let href = href.strip_prefix(TOPIC_PREFIX).unwrap_or(href).to_string();
    Some((
        SearchResult {
            title,
            description,
            href,
            breadcrumb,
        },
        location.is_some(),
    ))
}
