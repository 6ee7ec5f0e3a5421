use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classify;
use crate::error::ConfigError;

pub const DEFAULT_GESTURE_DEBOUNCE_MS: i64 = 1_000;
pub const DEFAULT_MAX_CHAIN_DEPTH: u32 = 20;

/// Tunables for one [`Composer`](crate::composer::Composer).
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Two gestures closer than this count as one user action.
    pub gesture_debounce_ms: i64,
    /// Consecutive redirects tolerated in one chain before handoff is refused.
    pub max_chain_depth: u32,
    /// Schemes the host renders itself and never hands off.
    pub internal_schemes: Vec<String>,
    /// Schemes a fallback URL may use to replace the current tab.
    pub fallback_schemes: Vec<String>,
    /// Allow a verified scoped application to take over its own scope.
    pub scoped_app_handoff: bool,
    pub marketplace: MarketplaceConfig,
    /// Destinations that always load in the host.
    pub pairing_rules: Vec<PairingRule>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            gesture_debounce_ms: DEFAULT_GESTURE_DEBOUNCE_MS,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            internal_schemes: ["about", "chrome", "chrome-native", "content"]
                .map(String::from)
                .to_vec(),
            fallback_schemes: ["http", "https"].map(String::from).to_vec(),
            scoped_app_handoff: true,
            marketplace: MarketplaceConfig::default(),
            pairing_rules: vec![PairingRule::default()],
        }
    }
}

/// Where package-hinted descriptors go when no handler is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    /// Lookup URL. `?id=<package>&referrer=<referrer>` is appended.
    pub lookup_base: String,
    pub store_package: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            lookup_base: "market://details".into(),
            store_package: "com.android.vending".into(),
        }
    }
}

/// A host plus a query parameter that together mark a device-pairing URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRule {
    /// Matches the host exactly or any subdomain of it.
    pub host_suffix: String,
    pub query_param: String,
}

impl Default for PairingRule {
    fn default() -> Self {
        Self {
            host_suffix: "youtube.com".into(),
            query_param: "pairingCode".into(),
        }
    }
}

impl DispatchConfig {
    /// Parse a TOML document. Scheme lists are lowercased.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.normalize()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded dispatch config");
        Ok(config)
    }

    pub fn is_internal_scheme(&self, scheme: &str) -> bool {
        self.internal_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
    }

    pub fn is_fallback_scheme(&self, scheme: &str) -> bool {
        self.fallback_schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
    }

    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.gesture_debounce_ms < 0 {
            return Err(ConfigError::Invalid {
                field: "gesture_debounce_ms",
                detail: format!("must not be negative, got {}", self.gesture_debounce_ms),
            });
        }
        for (field, list) in [
            ("internal_schemes", &mut self.internal_schemes),
            ("fallback_schemes", &mut self.fallback_schemes),
        ] {
            for scheme in list.iter_mut() {
                let trimmed = scheme.trim().trim_end_matches(':').to_ascii_lowercase();
                if trimmed.is_empty() {
                    return Err(ConfigError::Invalid {
                        field,
                        detail: "empty scheme".into(),
                    });
                }
                *scheme = trimmed;
            }
        }
        if let Some(scheme) = self
            .fallback_schemes
            .iter()
            .find(|s| classify::is_script_scheme(s))
        {
            return Err(ConfigError::Invalid {
                field: "fallback_schemes",
                detail: format!("script scheme `{scheme}` cannot be a fallback"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DispatchConfig::from_toml("").unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.gesture_debounce_ms, 1_000);
        assert_eq!(config.max_chain_depth, 20);
        assert!(config.scoped_app_handoff);
    }

    #[test]
    fn partial_document_overrides_only_named_keys() {
        let config = DispatchConfig::from_toml(
            r#"
            max_chain_depth = 5
            fallback_schemes = ["HTTPS:"]

            [marketplace]
            store_package = "org.example.store"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_chain_depth, 5);
        assert_eq!(config.fallback_schemes, vec!["https".to_string()]);
        assert_eq!(config.marketplace.store_package, "org.example.store");
        assert_eq!(config.marketplace.lookup_base, "market://details");
        assert_eq!(config.gesture_debounce_ms, DEFAULT_GESTURE_DEBOUNCE_MS);
    }

    #[test]
    fn scheme_lookups_ignore_case() {
        let config = DispatchConfig::default();
        assert!(config.is_internal_scheme("CHROME"));
        assert!(config.is_fallback_scheme("Https"));
        assert!(!config.is_fallback_scheme("market"));
    }

    #[test]
    fn negative_debounce_is_rejected() {
        let err = DispatchConfig::from_toml("gesture_debounce_ms = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "gesture_debounce_ms", .. }));
    }

    #[test]
    fn blank_scheme_is_rejected() {
        let err = DispatchConfig::from_toml(r#"internal_schemes = ["about", " "]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "internal_schemes", .. }));
    }

    #[test]
    fn script_fallback_scheme_is_rejected() {
        let err = DispatchConfig::from_toml(r#"fallback_schemes = ["https", "JavaScript:"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "fallback_schemes", .. }));
        assert!(err.to_string().contains("javascript"));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = DispatchConfig::from_toml("max_chain_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = DispatchConfig::load(Path::new("/nonexistent/navdispatch.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/navdispatch.toml"));
    }
}
