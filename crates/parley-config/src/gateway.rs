use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Gateway and client call limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Idle limit for a chat call
    #[serde(deserialize_with = "duration")]
    pub chat_timeout: Duration,
    /// Idle limit for a connectivity probe
    #[serde(deserialize_with = "duration")]
    pub probe_timeout: Duration,
    /// Longest gap between two vendor stream reads
    #[serde(deserialize_with = "duration")]
    pub stream_idle_timeout: Duration,
    /// Skip the private-address check (LAN Ollama setups)
    pub allow_private_targets: bool,
    /// Longest SSE line or NDJSON fragment the decoder buffers
    pub max_stream_line_bytes: usize,
    /// `max_tokens` sent to Anthropic when the caller gives none
    pub anthropic_max_tokens: u32,
    /// Characters of vendor body kept in a diagnostic
    pub diagnostic_snippet_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            chat_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(60),
            stream_idle_timeout: Duration::from_secs(600),
            allow_private_targets: false,
            max_stream_line_bytes: 1024 * 1024,
            anthropic_max_tokens: 4096,
            diagnostic_snippet_chars: 600,
        }
    }
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_strings() {
        let config: GatewayConfig = toml::from_str(
            r#"
            chat_timeout = "2m"
            stream_idle_timeout = "90s"
            "#,
        )
        .unwrap();

        assert_eq!(config.chat_timeout, Duration::from_secs(120));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(90));
        assert_eq!(config.probe_timeout, Duration::from_secs(60));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = toml::from_str::<GatewayConfig>(r#"chat_timeout = "soon""#).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }
}
