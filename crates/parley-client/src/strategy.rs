//! Ordered call strategies

use std::fmt;
use std::future::Future;

use parley_core::{ErrorInfo, FailureKind, Stage};

use crate::options::{ClientOptions, Deployment};

/// Route a call takes to the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Through the gateway's `/gateway/*` endpoints
    Proxy,
    /// Straight to the vendor with the in-process adapters
    Direct,
}

impl Strategy {
    pub const fn stage(self) -> Stage {
        match self {
            Self::Proxy => Stage::Proxy,
            Self::Direct => Stage::Direct,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage().as_str())
    }
}

/// Strategies to try, in order, for a vendor at `target_base_url`
///
/// An HTTPS origin cannot reach a plain-HTTP vendor, so such targets only go
/// through the gateway. Falling back to a direct call is allowed for local
/// deployments only.
pub fn plan(options: &ClientOptions, target_base_url: &str) -> Vec<Strategy> {
    if options.proxy_url.is_none() {
        return vec![Strategy::Direct];
    }

    let mixed_content = options.secure_origin()
        && target_base_url
            .trim()
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://"));

    if mixed_content || options.deployment == Deployment::Production {
        vec![Strategy::Proxy]
    } else {
        vec![Strategy::Proxy, Strategy::Direct]
    }
}

/// Run `attempt` for each strategy until one succeeds
///
/// Returns the winning strategy with its value, or the first failure, which
/// is the most informative one since later strategies are fallbacks.
pub async fn first_success<T, F, Fut>(strategies: &[Strategy], mut attempt: F) -> Result<(Strategy, T), ErrorInfo>
where
    F: FnMut(Strategy) -> Fut,
    Fut: Future<Output = Result<T, ErrorInfo>>,
{
    let mut first_failure = None;

    for &strategy in strategies {
        match attempt(strategy).await {
            Ok(value) => return Ok((strategy, value)),
            Err(info) => {
                tracing::debug!(%strategy, category = %info.category(), "strategy failed");
                first_failure.get_or_insert(info);
            }
        }
    }

    Err(first_failure.unwrap_or_else(|| ErrorInfo::new(FailureKind::Other, "no call strategy available", Stage::Validate)))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::executor::block_on;
    use url::Url;

    use super::*;

    fn options(proxy: bool, origin: Option<&str>, deployment: Deployment) -> ClientOptions {
        ClientOptions {
            proxy_url: proxy.then(|| Url::parse("https://phone.example.com").unwrap()),
            origin: origin.map(|o| Url::parse(o).unwrap()),
            deployment,
            ..ClientOptions::default()
        }
    }

    #[test]
    fn no_proxy_means_direct() {
        assert_eq!(plan(&options(false, None, Deployment::Production), "https://api.x.test"), vec![
            Strategy::Direct
        ]);
    }

    #[test]
    fn mixed_content_forces_proxy() {
        let opts = options(true, Some("https://phone.example.com"), Deployment::Local);
        assert_eq!(plan(&opts, "http://192.168.1.5:11434"), vec![Strategy::Proxy]);
        assert_eq!(plan(&opts, "https://api.x.test"), vec![Strategy::Proxy, Strategy::Direct]);
    }

    #[test]
    fn production_never_goes_direct() {
        let opts = options(true, Some("http://localhost:5173"), Deployment::Production);
        assert_eq!(plan(&opts, "https://api.x.test"), vec![Strategy::Proxy]);
    }

    #[test]
    fn first_success_short_circuits() {
        let calls = Cell::new(0);
        let result = block_on(first_success(&[Strategy::Proxy, Strategy::Direct], |strategy| {
            calls.set(calls.get() + 1);
            async move { Ok::<_, ErrorInfo>(strategy) }
        }));

        assert_eq!(result.unwrap(), (Strategy::Proxy, Strategy::Proxy));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn first_failure_is_reported() {
        let result = block_on(first_success(&[Strategy::Proxy, Strategy::Direct], |strategy| async move {
            let kind = match strategy {
                Strategy::Proxy => FailureKind::Aborted,
                Strategy::Direct => FailureKind::Connection,
            };
            Err::<(), _>(ErrorInfo::new(kind, "failed", strategy.stage()))
        }));

        assert_eq!(result.unwrap_err().stage(), Stage::Proxy);
    }
}
