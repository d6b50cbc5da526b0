//! Base URL normalization
//!
//! Users paste whatever their vendor dashboard shows: a bare host, a full
//! `/chat/completions` endpoint, a Gemini model URL. Everything is reduced to
//! the root the provider adapters append their own paths to.

use std::sync::OnceLock;

use regex::Regex;

use crate::ApiInterface;

/// Endpoint fragments that belong to a request path, not to a base URL
const STRAY_SUFFIXES: &[&str] = &[
    "/chat/completions",
    "/completions",
    "/models",
    "/messages",
    ":streamGenerateContent",
    ":generateContent",
    "/streamGenerateContent",
    "/generateContent",
    "/chat",
    "/tags",
];

/// OpenAI-compatible root that is versioned as `v4` and must stay as-is
const BIGMODEL_ROOT: &str = "open.bigmodel.cn/api/paas/v4";

fn version_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v\d+((alpha|beta)\d*)?$").expect("must be valid regex"))
}

/// Normalize a user-supplied base URL into the canonical vendor root
///
/// Never fails: malformed input comes back trimmed and is rejected later
/// when it is parsed as a URL. Normalizing the output again is a no-op.
pub fn normalize_base_url(raw: &str, interface: ApiInterface) -> String {
    let trimmed = raw.trim();
    let (without_query, query) = match trimmed.split_once('?') {
        Some((head, tail)) => (head, Some(tail)),
        None => (trimmed, None),
    };

    let (origin, path) = split_origin(without_query.trim_end_matches('/'));
    let mut path = strip_stray_suffixes(path);

    let full = format!("{origin}{path}");
    if full.contains(BIGMODEL_ROOT) {
        return reattach_query(full, query);
    }

    path = apply_version(&path, interface);
    reattach_query(format!("{origin}{path}"), query)
}

/// Split `scheme://authority` from the path so suffix stripping never eats the host
fn split_origin(url: &str) -> (&str, &str) {
    let authority_start = url.find("://").map_or(0, |i| i + 3);
    match url[authority_start..].find('/') {
        Some(i) => url.split_at(authority_start + i),
        None => (url, ""),
    }
}

fn strip_stray_suffixes(path: &str) -> String {
    let mut path = path.trim_end_matches('/').to_owned();
    loop {
        let before = path.len();
        for suffix in STRAY_SUFFIXES {
            if let Some(stripped) = path.strip_suffix(suffix) {
                path = stripped.trim_end_matches('/').to_owned();
            }
        }
        if path.len() == before {
            return path;
        }
    }
}

/// Truncate after an existing version segment, or append the interface default
fn apply_version(path: &str, interface: ApiInterface) -> String {
    let segments: Vec<&str> = path.split('/').collect();

    if interface == ApiInterface::Ollama {
        if let Some(i) = segments.iter().position(|s| *s == "api") {
            return segments[..=i].join("/");
        }
        // An OpenAI-style `/v1` on an Ollama host points at the compat layer,
        // the native API lives beside it
        if let Some(i) = segments.iter().position(|s| version_segment().is_match(s)) {
            return format!("{}{}", segments[..i].join("/"), interface.version_suffix());
        }
        return format!("{path}{}", interface.version_suffix());
    }

    match segments.iter().position(|s| version_segment().is_match(s)) {
        Some(i) => segments[..=i].join("/"),
        None => format!("{path}{}", interface.version_suffix()),
    }
}

fn reattach_query(url: String, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{url}?{q}"),
        _ => url,
    }
}
