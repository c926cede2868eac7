//! Optional observability helpers for session and renewal stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_broker.auth` with the `stage` and
//!   `site` (call site) fields, plus one event per recorded outcome.
//! - Enable `metrics` to increment the `session_broker_auth_total` counter for every
//!   attempt/success/no-session/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Auth stages observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthStage {
	/// Single-flight call to the refresh endpoint.
	Renewal,
	/// 401-triggered renewal that releases queued requests.
	Recovery,
	/// One-time session restoration on startup.
	Bootstrap,
	/// Credential login.
	Login,
	/// Server-side logout plus local cleanup.
	Logout,
}
impl AuthStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthStage::Renewal => "renewal",
			AuthStage::Recovery => "recovery",
			AuthStage::Bootstrap => "bootstrap",
			AuthStage::Login => "login",
			AuthStage::Logout => "logout",
		}
	}
}
impl Display for AuthStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Completion without an active session.
	NoSession,
	/// Failure propagated back to the caller.
	Failure,
}
impl AuthOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthOutcome::Attempt => "attempt",
			AuthOutcome::Success => "success",
			AuthOutcome::NoSession => "no_session",
			AuthOutcome::Failure => "failure",
		}
	}
}
impl Display for AuthOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
