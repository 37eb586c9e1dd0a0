//! URL matching over extracted comment text
//!
//! A single case-insensitive pattern finds `http`/`https` URLs with a host
//! (dotted quad, bracketed IPv6-like token or hostname), an optional port and
//! at least one path segment. Matches are then split into components without
//! any normalization, so `raw` and the parts always agree character for
//! character. Whatever the pattern accepts is kept; port ranges and address
//! octets are not checked.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::ExtractedUrl;

/// URL grammar applied to every comment
pub const URL_PATTERN: &str = r"(?i)https?://(?:\w+:\w+@)?(?:[\d.]{7,15}|\[[\d:a-f]{3,39}\]|[a-z\d][a-z\d\-.]{0,252})(?::\d{1,5})?(?:/[\w\-.~!$&'()*+,;%=:@?#]*)+";

static URL_REGEX: OnceLock<Regex> = OnceLock::new();

fn url_regex() -> &'static Regex {
    // Constant pattern; every test in this module compiles it
    URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("URL_PATTERN is a valid regex"))
}

/// Find every URL in `comments`, in discovery order
///
/// Repeated URLs are reported once per occurrence.
pub fn match_urls<S: AsRef<str>>(comments: &[S]) -> Vec<ExtractedUrl> {
    comments
        .iter()
        .flat_map(|comment| find_urls(comment.as_ref()))
        .collect()
}

/// Find every URL in a single piece of text
pub fn find_urls(text: &str) -> Vec<ExtractedUrl> {
    url_regex()
        .find_iter(text)
        .filter_map(|m| decompose(m.as_str()))
        .collect()
}

/// Split a URL into scheme, network location, path, query and fragment
///
/// The fragment starts at the first `#`, the query at the first `?` before
/// it, and the network location runs from `//` to the first `/` after that.
/// Only the scheme is lowercased.
pub fn decompose(raw: &str) -> Option<ExtractedUrl> {
    let (scheme, rest) = raw.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }

    let (rest, fragment) = rest.split_once('#').unwrap_or((rest, ""));
    let (rest, query) = rest.split_once('?').unwrap_or((rest, ""));
    let (host, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));

    Some(ExtractedUrl {
        raw: raw.to_string(),
        scheme: scheme.to_ascii_lowercase(),
        host: host.to_string(),
        path: path.to_string(),
        query: query.to_string(),
        fragment: fragment.to_string(),
    })
}
