//! Navigation dispatch policy.
//!
//! Decides, for each navigation a host is about to perform, whether it loads
//! in the host, is handed to an external application, replaces the tab with a
//! fallback URL, or waits on an asynchronous confirmation.

pub mod chain;
pub mod classify;
pub mod codec;
pub mod composer;
pub mod config;
pub mod error;
pub mod resolution;
pub mod scenario;
pub mod scope;
pub mod table;
pub mod types;

pub use chain::{ChainPhase, Observation, RedirectChainState};
pub use codec::LaunchDescriptor;
pub use composer::{Composer, Dispatch, Instruction, StayReason};
pub use config::DispatchConfig;
pub use resolution::HostDelegate;
pub use types::{AsyncActionKind, Decision, DecisionKind, HandlerCandidate, NavigationRequest, TransitionFlags};
