//! Optional observability helpers wrapping every session flow.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `portal_session.flow` with the
//!   `flow` (authorize/refresh/info/connect/disconnect) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `portal_session_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session flow kinds observed by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Interactive (re-)authorization, including the PKCE code exchange.
	Authorize,
	/// Refresh-token exchange.
	Refresh,
	/// `GET <api>/info`.
	Info,
	/// `POST <api>/connect`.
	Connect,
	/// `POST <api>/disconnect`.
	Disconnect,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Authorize => "authorize",
			Self::Refresh => "refresh",
			Self::Info => "info",
			Self::Connect => "connect",
			Self::Disconnect => "disconnect",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
