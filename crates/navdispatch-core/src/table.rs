//! Table-driven [`HostDelegate`].
//!
//! Handlers are declared as URL-prefix rules, so a host can be described in
//! a TOML or JSON file. Side effects are recorded in a [`SideEffectLog`]
//! instead of launching anything.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codec::LaunchDescriptor;
use crate::error::{ConfigError, RegistryError};
use crate::resolution::HostDelegate;
use crate::scope::ScopeClaim;
use crate::types::{Decision, HandlerCandidate};

/// Candidates reported for every target starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRule {
    pub prefix: String,
    pub candidates: Vec<HandlerCandidate>,
}

impl HandlerRule {
    pub fn new(prefix: impl Into<String>, candidates: Vec<HandlerCandidate>) -> Self {
        Self {
            prefix: prefix.into(),
            candidates,
        }
    }
}

/// Forces the registry's answer regardless of rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOverride {
    /// Unmatched targets still resolve to a generic catch-all handler.
    Always,
    /// Nothing resolves.
    Never,
}

/// Id of the catch-all candidate reported under [`ResolveOverride::Always`].
pub const CATCH_ALL_ID: &str = "catch_all";

/// What a [`TableHost`] was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectLog {
    pub started: Vec<LaunchDescriptor>,
    pub incognito: Vec<LaunchDescriptor>,
    pub file_access: Vec<LaunchDescriptor>,
    /// `(url, referrer)` pairs.
    pub clobbered: Vec<(String, Option<String>)>,
}

impl SideEffectLog {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.incognito.is_empty()
            && self.file_access.is_empty()
            && self.clobbered.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableHost {
    pub identity: String,
    pub foreground: bool,
    /// Matching rules contribute candidates in order, first occurrence of an
    /// id wins.
    pub handlers: Vec<HandlerRule>,
    /// Reported when no rule matches.
    pub default_candidates: Vec<HandlerCandidate>,
    pub resolve_override: Option<ResolveOverride>,
    pub scopes: Vec<ScopeClaim>,
    pub default_messaging_handler: Option<String>,
    /// URL prefixes that need a file-access prompt.
    pub file_access_prefixes: Vec<String>,
    /// Targets whose registry query fails.
    pub failing_prefixes: Vec<String>,
    #[serde(skip)]
    pub log: SideEffectLog,
}

impl Default for TableHost {
    fn default() -> Self {
        Self::new("org.navdispatch.host")
    }
}

impl TableHost {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            foreground: true,
            handlers: Vec::new(),
            default_candidates: Vec::new(),
            resolve_override: None,
            scopes: Vec::new(),
            default_messaging_handler: None,
            file_access_prefixes: Vec::new(),
            failing_prefixes: Vec::new(),
            log: SideEffectLog::default(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn with_rule(mut self, prefix: &str, candidates: Vec<HandlerCandidate>) -> Self {
        self.handlers.push(HandlerRule::new(prefix, candidates));
        self
    }

    pub fn with_scope(mut self, claim: ScopeClaim) -> Self {
        self.scopes.push(claim);
        self
    }
}

impl HostDelegate for TableHost {
    fn query_candidates(
        &self,
        descriptor: &LaunchDescriptor,
    ) -> Result<Vec<HandlerCandidate>, RegistryError> {
        let target = descriptor.target_uri.as_str();
        if self.failing_prefixes.iter().any(|p| target.starts_with(p.as_str())) {
            return Err(RegistryError::Query {
                target: target.to_owned(),
                detail: "registry rule marked failing".into(),
            });
        }
        if self.resolve_override == Some(ResolveOverride::Never) {
            return Ok(Vec::new());
        }
        let mut out: Vec<HandlerCandidate> = Vec::new();
        let mut matched = false;
        for rule in self.handlers.iter().filter(|r| target.starts_with(r.prefix.as_str())) {
            matched = true;
            for candidate in &rule.candidates {
                if !out.iter().any(|c| c.id == candidate.id) {
                    out.push(candidate.clone());
                }
            }
        }
        if !matched {
            out.clone_from(&self.default_candidates);
        }
        if out.is_empty() && self.resolve_override == Some(ResolveOverride::Always) {
            out.push(HandlerCandidate::generic(CATCH_ALL_ID));
        }
        Ok(out)
    }

    fn find_associated_scope(&self, candidates: &[HandlerCandidate]) -> Option<ScopeClaim> {
        self.scopes
            .iter()
            .find(|claim| candidates.iter().any(|c| c.id == claim.scope_id))
            .cloned()
    }

    fn host_identity(&self) -> String {
        self.identity.clone()
    }

    fn is_host_foreground(&self) -> bool {
        self.foreground
    }

    fn default_messaging_handler(&self) -> Option<String> {
        self.default_messaging_handler.clone()
    }

    fn should_request_file_access(&self, url: &str) -> bool {
        self.file_access_prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }

    fn start_external(&mut self, descriptor: &LaunchDescriptor) {
        tracing::info!(target_uri = %descriptor.target_uri, "start external");
        self.log.started.push(descriptor.clone());
    }

    fn start_incognito(
        &mut self,
        descriptor: &LaunchDescriptor,
        _referrer: Option<&str>,
        _fallback_url: Option<&str>,
    ) {
        tracing::info!(target_uri = %descriptor.target_uri, "start external after incognito prompt");
        self.log.incognito.push(descriptor.clone());
    }

    fn start_file_access(&mut self, descriptor: &LaunchDescriptor, _referrer: Option<&str>) {
        tracing::info!(target_uri = %descriptor.target_uri, "request file access");
        self.log.file_access.push(descriptor.clone());
    }

    fn clobber_current_tab(&mut self, url: &str, referrer: Option<&str>) -> Decision {
        tracing::info!(%url, "clobber current tab");
        self.log
            .clobbered
            .push((url.to_owned(), referrer.map(str::to_owned)));
        Decision::OverrideClobberTab {
            new_url: url.to_owned(),
            referrer_url: referrer.map(str::to_owned),
        }
    }
}
