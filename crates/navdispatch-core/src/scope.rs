//! Scoped-application resolution.
//!
//! A scoped application is an installed app that owns a URL prefix (an
//! installed web app, for example). The host reports at most one claim per
//! lookup; a claim is admitted only when it is verified and the destination
//! falls inside its scope.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// ─── Types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// The claim's signature matched the registry's record.
    Verified,
    Unverified,
}

/// A scoped application's claim on a URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeClaim {
    /// Also the handler id the claim belongs to.
    pub scope_id: String,
    pub scope_url: String,
    pub credential: Credential,
}

/// Reason a claim was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRejection {
    Unverified { scope_id: String },
    MalformedScope { scope_id: String, scope_url: String },
    OutOfScope { scope_id: String },
}

impl fmt::Display for ClaimRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unverified { scope_id } => write!(f, "scope claim not verified: {scope_id}"),
            Self::MalformedScope { scope_id, scope_url } => {
                write!(f, "scope claim {scope_id} has malformed scope url {scope_url:?}")
            }
            Self::OutOfScope { scope_id } => write!(f, "destination outside scope of {scope_id}"),
        }
    }
}

/// Outcome of scope resolution for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeVerdict {
    /// The destination belongs to the scope the request already runs in.
    InScope,
    /// Hand off to this scoped application directly.
    TargetApp(String),
    /// Leaving the current scope with nothing specialized to go to.
    ReturnToHost,
    /// Scopes have no say.
    Unassociated,
}

// ─── Resolution ─────────────────────────────────────────────────────

/// Admit `claim` for `destination`.
pub fn admit(claim: &ScopeClaim, destination: &str) -> Result<(), ClaimRejection> {
    if claim.credential != Credential::Verified {
        return Err(ClaimRejection::Unverified {
            scope_id: claim.scope_id.clone(),
        });
    }
    let scope = Url::parse(&claim.scope_url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .ok_or_else(|| ClaimRejection::MalformedScope {
            scope_id: claim.scope_id.clone(),
            scope_url: claim.scope_url.clone(),
        })?;
    let inside = Url::parse(destination)
        .map(|dest| dest.origin() == scope.origin() && path_within(dest.path(), scope.path()))
        .unwrap_or(false);
    if inside {
        Ok(())
    } else {
        Err(ClaimRejection::OutOfScope {
            scope_id: claim.scope_id.clone(),
        })
    }
}

/// Whether `path` equals `scope` or lies below it on a segment boundary.
fn path_within(path: &str, scope: &str) -> bool {
    match path.strip_prefix(scope) {
        Some(rest) => scope.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolve scopes for a host-renderable destination.
///
/// * `current_scope` - Scope the request originates in, if any.
/// * `claim` - The host's claim lookup result for the candidate list.
/// * `specialized` - Number of specialized candidates.
/// * `handoff_enabled` - Whether a sole verified scoped app may take over.
pub fn resolve(
    current_scope: Option<&str>,
    destination: &str,
    claim: Option<&ScopeClaim>,
    specialized: usize,
    handoff_enabled: bool,
) -> ScopeVerdict {
    let admitted = claim.filter(|c| match admit(c, destination) {
        Ok(()) => true,
        Err(rejection @ ClaimRejection::MalformedScope { .. }) => {
            tracing::warn!(%rejection, "ignoring scope claim");
            false
        }
        Err(rejection) => {
            tracing::debug!(%rejection, "ignoring scope claim");
            false
        }
    });

    if let (Some(current), Some(claim)) = (current_scope, admitted) {
        if claim.scope_id == current {
            return ScopeVerdict::InScope;
        }
    }
    if current_scope.is_some() && specialized == 0 {
        return ScopeVerdict::ReturnToHost;
    }
    match admitted {
        Some(claim) if handoff_enabled && specialized == 1 => {
            ScopeVerdict::TargetApp(claim.scope_id.clone())
        }
        _ => ScopeVerdict::Unassociated,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
