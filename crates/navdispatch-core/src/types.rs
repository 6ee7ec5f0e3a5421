use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::LaunchDescriptor;

// ─── Transition flags ────────────────────────────────────────────

bitflags::bitflags! {
    /// How a navigation was initiated. Flags combine; a link opened by another
    /// application arrives as `LINK | FROM_EXTERNAL_LAUNCH`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TransitionFlags: u32 {
        const LINK = 1 << 0;
        const TYPED = 1 << 1;
        const FORM_SUBMIT = 1 << 2;
        const RELOAD = 1 << 3;
        const FORWARD_BACK = 1 << 4;
        const FROM_EXTERNAL_LAUNCH = 1 << 5;
        const AUTO_TOPLEVEL = 1 << 6;
    }
}

impl TransitionFlags {
    /// Transitions that mark an explicit, user-driven page load.
    pub const USER_NAVIGATION: Self = Self::TYPED.union(Self::RELOAD).union(Self::AUTO_TOPLEVEL);

    /// Transitions that can continue an existing chain without a redirect.
    pub const CLICK_LIKE: Self = Self::LINK.union(Self::FORM_SUBMIT);
}

impl Default for TransitionFlags {
    fn default() -> Self {
        Self::LINK
    }
}

/// Error returned when a transition list names an unknown flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transition flag: {0:?}")]
pub struct UnknownTransition(pub String);

impl FromStr for TransitionFlags {
    type Err = UnknownTransition;

    /// Parse `"link,typed"` or `"LINK | FROM_EXTERNAL_LAUNCH"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Self::empty();
        for name in s.split([',', '|']).map(str::trim).filter(|n| !n.is_empty()) {
            let upper = name.to_ascii_uppercase().replace('-', "_");
            let flag = Self::from_name(&upper).ok_or_else(|| UnknownTransition(name.to_owned()))?;
            flags |= flag;
        }
        Ok(flags)
    }
}

// ─── Navigation request ──────────────────────────────────────────

/// Immutable snapshot of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationRequest {
    pub url: String,
    pub referrer_url: Option<String>,
    pub is_incognito: bool,
    pub transitions: TransitionFlags,
    pub is_redirect: bool,
    pub has_user_gesture: bool,
    pub requires_host_foreground: bool,
    pub is_background_tab: bool,
    pub is_main_frame: bool,
    pub associated_scope_id: Option<String>,
    pub open_in_new_tab: bool,
}

impl Default for NavigationRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            referrer_url: None,
            is_incognito: false,
            transitions: TransitionFlags::LINK,
            is_redirect: false,
            has_user_gesture: false,
            requires_host_foreground: true,
            is_background_tab: false,
            is_main_frame: true,
            associated_scope_id: None,
            open_in_new_tab: false,
        }
    }
}

impl NavigationRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer_url = Some(referrer.into());
        self
    }

    pub fn with_transitions(mut self, transitions: TransitionFlags) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_redirect(mut self, is_redirect: bool) -> Self {
        self.is_redirect = is_redirect;
        self
    }

    pub fn with_incognito(mut self, is_incognito: bool) -> Self {
        self.is_incognito = is_incognito;
        self
    }

    pub fn with_user_gesture(mut self, has_user_gesture: bool) -> Self {
        self.has_user_gesture = has_user_gesture;
        self
    }

    pub fn with_foreground_required(mut self, required: bool) -> Self {
        self.requires_host_foreground = required;
        self
    }

    pub fn with_background_tab(mut self, is_background_tab: bool) -> Self {
        self.is_background_tab = is_background_tab;
        self
    }

    pub fn with_main_frame(mut self, is_main_frame: bool) -> Self {
        self.is_main_frame = is_main_frame;
        self
    }

    pub fn with_scope(mut self, scope_id: impl Into<String>) -> Self {
        self.associated_scope_id = Some(scope_id.into());
        self
    }

    pub fn with_new_tab(mut self, open_in_new_tab: bool) -> Self {
        self.open_in_new_tab = open_in_new_tab;
        self
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer_url.as_deref()
    }
}

// ─── Handler candidates ──────────────────────────────────────────

/// One resolver the host registry reported for a descriptor.
///
/// `is_specialized` means a distinct installed application. The host itself
/// and catch-all resolvers are generic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerCandidate {
    pub id: String,
    #[serde(default)]
    pub is_specialized: bool,
}

impl HandlerCandidate {
    pub fn generic(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_specialized: false,
        }
    }

    pub fn specialized(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_specialized: true,
        }
    }
}

// ─── Decision ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncActionKind {
    Incognito,
    FileAccess,
}

/// The engine's sole output for one navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Continue loading in the host.
    NoOverride,
    /// Drop the navigation: the host cannot render it and nothing is dispatched.
    Ignore,
    OverrideExternal {
        descriptor: LaunchDescriptor,
    },
    OverrideClobberTab {
        new_url: String,
        referrer_url: Option<String>,
    },
    OverrideAsyncAction {
        action: AsyncActionKind,
    },
}

/// Variant tag of a [`Decision`], for expectations and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    NoOverride,
    Ignore,
    OverrideExternal,
    OverrideClobberTab,
    OverrideAsyncAction,
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::NoOverride => DecisionKind::NoOverride,
            Self::Ignore => DecisionKind::Ignore,
            Self::OverrideExternal { .. } => DecisionKind::OverrideExternal,
            Self::OverrideClobberTab { .. } => DecisionKind::OverrideClobberTab,
            Self::OverrideAsyncAction { .. } => DecisionKind::OverrideAsyncAction,
        }
    }

    /// Whether the navigation leaves the normal in-host load path.
    pub fn is_override(&self) -> bool {
        !matches!(self, Self::NoOverride)
    }
}

impl DecisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoOverride => "no_override",
            Self::Ignore => "ignore",
            Self::OverrideExternal => "override_external",
            Self::OverrideClobberTab => "override_clobber_tab",
            Self::OverrideAsyncAction => "override_async_action",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tests ───────────────────────────────────────────────────────
