//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.routes.path, "routes.json");
        assert_eq!(config.routes.reload_interval_secs, 10);
        assert_eq!(config.response.chunked_threshold_bytes, 1024 * 1024);
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn headers_keep_declaration_order() {
        let config = parse_config(
            r#"
            [upstream]
            origin = "https://media.example.com"
            headers = [
                { name = "Host", value = "media.example.com" },
                { name = "User-Agent", value = "Mozilla/5.0" },
                { name = "Referer", value = "https://media.example.com" },
            ]
            "#,
        )
        .unwrap();

        let names: Vec<_> = config.upstream.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Host", "User-Agent", "Referer"]);
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let err = parse_config("[upstream]\norigin = \"not a url\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("upstream.origin"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = parse_config("[upstream\norigin = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
