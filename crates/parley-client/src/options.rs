use std::time::Duration;

use parley_config::GatewayConfig;
use parley_llm::CallLimits;
use url::Url;

/// Where the calling application runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deployment {
    /// Developer machine or self-hosted box; direct calls are an acceptable fallback
    Local,
    /// Hosted; vendor calls always go through the gateway
    #[default]
    Production,
}

/// Knobs of a [`ChatClient`](crate::ChatClient)
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Gateway root, e.g. `https://phone.example.com`; `None` means direct only
    pub proxy_url: Option<Url>,
    /// Origin the application is served from
    pub origin: Option<Url>,
    pub deployment: Deployment,
    /// Ask for a streamed reply and assemble it
    pub stream: bool,
    /// Idle limit for a chat call
    pub chat_timeout: Duration,
    /// Idle limit for a connectivity probe
    pub probe_timeout: Duration,
    /// Characters of vendor body kept in a failure
    pub snippet_chars: usize,
    pub limits: CallLimits,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for ClientOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            proxy_url: None,
            origin: None,
            deployment: Deployment::default(),
            stream: false,
            chat_timeout: config.chat_timeout,
            probe_timeout: config.probe_timeout,
            snippet_chars: config.diagnostic_snippet_chars,
            limits: CallLimits::from(config),
        }
    }
}

impl ClientOptions {
    /// Whether the origin is HTTPS, which blocks plain-HTTP targets
    pub fn secure_origin(&self) -> bool {
        self.origin.as_ref().is_some_and(|o| o.scheme() == "https")
    }
}
