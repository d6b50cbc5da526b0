use std::path::Path;
use std::time::Duration;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, deserializes and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// expanded, the TOML is invalid, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`] minus the file read
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Reject values that would make every request fail
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting
    pub fn validate(&self) -> anyhow::Result<()> {
        let gateway = &self.gateway;

        for (name, value) in [
            ("gateway.chat_timeout", gateway.chat_timeout),
            ("gateway.probe_timeout", gateway.probe_timeout),
            ("gateway.stream_idle_timeout", gateway.stream_idle_timeout),
        ] {
            if value == Duration::ZERO {
                anyhow::bail!("{name} must be greater than 0");
            }
        }

        if gateway.max_stream_line_bytes == 0 {
            anyhow::bail!("gateway.max_stream_line_bytes must be greater than 0");
        }

        if gateway.diagnostic_snippet_chars == 0 {
            anyhow::bail!("gateway.diagnostic_snippet_chars must be greater than 0");
        }

        if gateway.anthropic_max_tokens == 0 {
            anyhow::bail!("gateway.anthropic_max_tokens must be greater than 0");
        }

        if self.server.health.enabled && !self.server.health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/'");
        }

        Ok(())
    }
}
