use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Failure while expanding a placeholder
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExpandError {
    /// Variable unset and no default given
    #[error("environment variable not found: `{0}` (line {1})")]
    Missing(String, usize),
    /// Placeholder scoped to something other than `env.`
    #[error("only `env.` placeholders are supported, got `{0}` (line {1})")]
    Scope(String, usize),
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // {{ scope.NAME }} or {{ scope.NAME | default("x") }}
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\)\s*)?\}\}"#).expect("must be valid regex")
    })
}

/// Replace `{{ env.VAR }}` placeholders in raw config text
///
/// Comment lines are copied verbatim so a commented-out secret does not
/// have to be set.
pub fn expand_env(input: &str) -> Result<String, ExpandError> {
    let mut lines = Vec::new();

    for (index, line) in input.split('\n').enumerate() {
        if line.trim_start().starts_with('#') || !line.contains("{{") {
            lines.push(line.to_owned());
            continue;
        }
        lines.push(expand_line(line, index + 1)?);
    }

    Ok(lines.join("\n"))
}

fn expand_line(line: &str, number: usize) -> Result<String, ExpandError> {
    let mut failure = None;

    let expanded = placeholder().replace_all(line, |caps: &Captures<'_>| {
        let key = &caps[1];
        let fallback = caps.get(2).map(|m| m.as_str());

        let Some(name) = key.strip_prefix("env.").filter(|n| !n.contains('.')) else {
            failure.get_or_insert(ExpandError::Scope(key.to_owned(), number));
            return String::new();
        };

        match (std::env::var(name), fallback) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_owned(),
            (Err(_), None) => {
                failure.get_or_insert(ExpandError::Missing(name.to_owned(), number));
                String::new()
            }
        }
    });

    match failure {
        Some(error) => Err(error),
        None => Ok(expanded.into_owned()),
    }
}
