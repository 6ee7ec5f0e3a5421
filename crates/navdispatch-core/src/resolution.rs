//! The host seam and handler-candidate helpers.

use crate::codec::LaunchDescriptor;
use crate::error::RegistryError;
use crate::scope::ScopeClaim;
use crate::types::{Decision, HandlerCandidate};

/// Everything the engine needs from its host application.
///
/// Query methods take `&self` and are called while deciding. Side effects take
/// `&mut self` and run only when a [`Dispatch`](crate::composer::Dispatch) is
/// applied.
pub trait HostDelegate {
    /// Installed handlers for `descriptor`, in registry order.
    fn query_candidates(
        &self,
        descriptor: &LaunchDescriptor,
    ) -> Result<Vec<HandlerCandidate>, RegistryError>;

    fn count_specialized(&self, candidates: &[HandlerCandidate]) -> usize {
        candidates.iter().filter(|c| c.is_specialized).count()
    }

    fn is_specialized(&self, candidates: &[HandlerCandidate]) -> bool {
        self.count_specialized(candidates) > 0
    }

    /// The scope claim of a candidate in `candidates`, if any owns one.
    fn find_associated_scope(&self, candidates: &[HandlerCandidate]) -> Option<ScopeClaim>;

    /// The host's own package identity.
    fn host_identity(&self) -> String;

    fn is_host_foreground(&self) -> bool;

    fn default_messaging_handler(&self) -> Option<String> {
        None
    }

    /// Whether loading `url` first needs a file-access permission prompt.
    fn should_request_file_access(&self, _url: &str) -> bool {
        false
    }

    fn start_external(&mut self, descriptor: &LaunchDescriptor);

    /// Launch after the user confirms leaving an incognito session.
    fn start_incognito(
        &mut self,
        descriptor: &LaunchDescriptor,
        referrer: Option<&str>,
        fallback_url: Option<&str>,
    );

    fn start_file_access(&mut self, descriptor: &LaunchDescriptor, referrer: Option<&str>);

    /// Replace the current tab's page with `url`. The host picks the
    /// decision it reports, usually `OverrideClobberTab`.
    fn clobber_current_tab(&mut self, url: &str, referrer: Option<&str>) -> Decision;
}

/// Query candidates for `descriptor`. A registry failure reads as no
/// candidates.
pub fn query<H: HostDelegate + ?Sized>(host: &H, descriptor: &LaunchDescriptor) -> Vec<HandlerCandidate> {
    match host.query_candidates(descriptor) {
        Ok(candidates) => candidates,
        Err(error) => {
            tracing::warn!(%error, target_uri = %descriptor.target_uri, "handler query failed");
            Vec::new()
        }
    }
}

/// Whether `current` contains a specialized handler that `previous` lacks.
pub fn has_new_specialized(current: &[HandlerCandidate], previous: &[HandlerCandidate]) -> bool {
    current
        .iter()
        .filter(|c| c.is_specialized)
        .any(|c| !previous.iter().any(|p| p.id == c.id))
}

/// Whether every specialized handler in `current` also appears in `previous`.
pub fn is_specialized_subset(current: &[HandlerCandidate], previous: &[HandlerCandidate]) -> bool {
    !has_new_specialized(current, previous)
}
