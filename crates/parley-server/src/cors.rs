use std::str::FromStr;

use http::header::HeaderName;
use http::{HeaderValue, Method};
use parley_config::{AnyOrArray, CorsConfig};
use parley_llm::protocol::gateway::DIAGNOSTIC_HEADER;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Browser access policy for the gateway routes
///
/// The diagnostic header is always exposed so a page can tell a failure
/// description from a model reply.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = match &config.origins {
        AnyOrArray::Any => AllowOrigin::any(),
        AnyOrArray::List(list) => AllowOrigin::list(parse_each::<HeaderValue>(list, "origin")),
    };
    let methods = match &config.methods {
        AnyOrArray::Any => AllowMethods::any(),
        AnyOrArray::List(list) => AllowMethods::list(parse_each::<Method>(list, "method")),
    };
    let headers = match &config.headers {
        AnyOrArray::Any => AllowHeaders::any(),
        AnyOrArray::List(list) => AllowHeaders::list(parse_each::<HeaderName>(list, "header")),
    };

    let layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers([HeaderName::from_static(DIAGNOSTIC_HEADER)]);

    match config.max_age_duration() {
        Some(max_age) => layer.max_age(max_age),
        None => layer,
    }
}

/// Parse configured values, skipping the ones that are not valid
fn parse_each<T: FromStr>(values: &[String], kind: &'static str) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(kind, value = %value, "ignoring invalid CORS entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_entries_are_skipped() {
        let methods: Vec<Method> = parse_each(&["GET".to_owned(), "not a method".to_owned()], "method");
        assert_eq!(methods, vec![Method::GET]);
    }
}
