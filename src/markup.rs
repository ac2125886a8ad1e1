//! Text helpers for the server's HTML and URL conventions.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::form_urlencoded;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Plain text of an HTML snippet: tags dropped, entities decoded, whitespace
/// collapsed and trimmed.
pub fn decode_html(html: &str) -> String {
    let text = TAG.replace_all(html, "");
    let text = ENTITY.replace_all(&text, |caps: &Captures| decode_entity(&caps[1], &caps[0]));
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn decode_entity(name: &str, raw: &str) -> String {
    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    if let Some(code) = code {
        return char::from_u32(code)
            .map(String::from)
            .unwrap_or_else(|| raw.to_string());
    }
    match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "hellip" => "\u{2026}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        _ => raw,
    }
    .to_string()
}

/// Percent-encode a single URI component. Spaces become `%20`.
pub fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Inverse of [`encode_component`]. A literal `+` is kept as-is.
pub fn decode_component(encoded: &str) -> String {
    let guarded = encoded
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D");
    let pair = format!("v={guarded}");
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Value of `name` in a `&`-separated parameter list, decoded. A leading `?`
/// or anything before it is ignored.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    let query = query.split_once('?').map(|(_, q)| q).unwrap_or(query);
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then(|| decode_component(value))
    })
}

/// Millisecond timestamp appended as `t=` to pages the server must not
/// answer from a cache.
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub fn cache_buster() -> u64 {
    js_sys::Date::now() as u64
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm")))]
pub fn cache_buster() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Escape every regex metacharacter in `text`.
pub fn escape_regex(text: &str) -> String {
    regex::escape(text)
}

/// Strip the query string and fragment from an href.
pub fn without_query_and_hash(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entities_and_collapses_whitespace() {
        assert_eq!(
            decode_html("  <b>Fish &amp;\n  chips</b> &lt;tag&gt; &#65;&#x42; "),
            "Fish & chips <tag> AB"
        );
        assert_eq!(decode_html("&bogus; stays"), "&bogus; stays");
    }

    #[test]
    fn component_encoding_matches_browser_conventions() {
        assert_eq!(encode_component("a b&c"), "a%20b%26c");
        assert_eq!(decode_component("a%20b%26c"), "a b&c");
        assert_eq!(decode_component("1+1"), "1+1");
    }

    #[test]
    fn reads_query_params() {
        let q = "searchView.jsp?searchWord=foo%20bar&toc=%2Fplugin%2Ftoc.xml&path=2";
        assert_eq!(query_param(q, "searchWord").as_deref(), Some("foo bar"));
        assert_eq!(query_param(q, "toc").as_deref(), Some("/plugin/toc.xml"));
        assert_eq!(query_param(q, "scope"), None);
    }

    #[test]
    fn strips_query_and_hash() {
        assert_eq!(without_query_and_hash("/topic/a.html?x=1#b"), "/topic/a.html");
        assert_eq!(without_query_and_hash("/topic/a.html#b"), "/topic/a.html");
        assert_eq!(without_query_and_hash("/topic/a.html"), "/topic/a.html");
    }
}
