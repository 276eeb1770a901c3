//! Agent configuration for the CLI: a TOML file when given, otherwise the
//! agent defaults with `QOE_*` environment overrides.

use std::path::Path;

use qoe_agent::AgentConfig;
use tracing::debug;

use crate::error::Result;

pub fn load(path: Option<&Path>) -> Result<AgentConfig> {
    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading agent config");
            from_toml_str(&std::fs::read_to_string(path)?)?
        }
        None => AgentConfig::from_env()?,
    };
    Ok(config)
}

pub fn from_toml_str(raw: &str) -> Result<AgentConfig> {
    let config: AgentConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

pub fn show(config: &AgentConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = from_toml_str(
            r#"
            [beacon]
            domain = ".example.test"

            [delivery]
            queue_capacity = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.beacon.domain.as_deref(), Some(".example.test"));
        assert_eq!(config.delivery.queue_capacity, 50);
        assert_eq!(config.timing, AgentConfig::default().timing);
    }

    #[test]
    fn invalid_file_is_rejected() {
        assert!(from_toml_str("[delivery]\nqueue_capacity = 0\n").is_err());
        assert!(from_toml_str("[transport]\nscheme = \"ftp\"\n").is_err());
    }

    #[test]
    fn rendered_config_parses_back() {
        let rendered = show(&AgentConfig::default()).unwrap();
        assert_eq!(from_toml_str(&rendered).unwrap(), AgentConfig::default());
    }
}
