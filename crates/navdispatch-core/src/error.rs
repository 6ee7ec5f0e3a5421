use std::path::PathBuf;

/// Errors from loading a [`DispatchConfig`](crate::config::DispatchConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {detail}")]
    Invalid { field: &'static str, detail: String },
}

/// Failure reported by the host's handler registry.
///
/// The composer never propagates these: a failed query is treated as an
/// empty candidate list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handler query failed for {target}: {detail}")]
    Query { target: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_messages_name_the_target() {
        let err = RegistryError::Query {
            target: "tel:1".into(),
            detail: "binder died".into(),
        };
        assert_eq!(err.to_string(), "handler query failed for tel:1: binder died");
    }

    #[test]
    fn invalid_config_error_names_the_field() {
        let err = ConfigError::Invalid {
            field: "fallback_schemes",
            detail: "empty scheme".into(),
        };
        assert!(err.to_string().contains("fallback_schemes"));
    }
}
