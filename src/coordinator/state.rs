//! Coordinator state machine: held token, renewal marker, and recovery queue.
//!
//! Every transition runs under the coordinator's mutex. Only `Idle -> InFlight` (renewal) and
//! `Idle -> Recovering` (recovery) start new work; both return to `Idle` from inside the shared
//! future that owns the work, guarded by the id handed out when the work started.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::RenewalFailurePolicy,
	coordinator::{RenewalOutcome, SharedOutcome},
};

/// Single-flight marker for calls to the refresh endpoint.
pub(crate) enum RenewalState {
	Idle,
	InFlight { id: u64, outcome: SharedOutcome },
}

/// 401-triggered renewal plus the requests parked on it.
pub(crate) enum RecoveryState {
	Idle,
	Recovering { id: u64, outcome: SharedOutcome, queued: usize },
}

pub(crate) struct CoordinatorState {
	pub(crate) access_token: Option<AccessToken>,
	pub(crate) renewal: RenewalState,
	pub(crate) recovery: RecoveryState,
	next_id: u64,
}
impl CoordinatorState {
	pub(crate) fn next_id(&mut self) -> u64 {
		self.next_id += 1;

		self.next_id
	}

	/// Replaces the held token, returning the new value when it differs from the old one.
	pub(crate) fn replace_token(
		&mut self,
		next: Option<AccessToken>,
	) -> Option<Option<AccessToken>> {
		if self.access_token == next {
			return None;
		}

		self.access_token = next.clone();

		Some(next)
	}

	pub(crate) fn finish_renewal(&mut self, id: u64) {
		if matches!(self.renewal, RenewalState::InFlight { id: current, .. } if current == id) {
			self.renewal = RenewalState::Idle;
		}
	}

	/// Applies a recovery outcome and releases the recovery marker in the same step.
	///
	/// Returns the token change observers must hear about, if any.
	pub(crate) fn complete_recovery(
		&mut self,
		id: u64,
		outcome: &RenewalOutcome,
		policy: RenewalFailurePolicy,
	) -> Option<Option<AccessToken>> {
		if !matches!(self.recovery, RecoveryState::Recovering { id: current, .. } if current == id)
		{
			return None;
		}

		self.recovery = RecoveryState::Idle;

		match outcome {
			Ok(token) => self.replace_token(token.clone()),
			Err(cause) if policy.keeps_token(cause) => None,
			Err(_) => self.replace_token(None),
		}
	}

	pub(crate) fn queued(&self) -> usize {
		match self.recovery {
			RecoveryState::Recovering { queued, .. } => queued,
			RecoveryState::Idle => 0,
		}
	}

	pub(crate) fn is_busy(&self) -> bool {
		matches!(self.renewal, RenewalState::InFlight { .. })
			|| matches!(self.recovery, RecoveryState::Recovering { .. })
	}
}
impl Default for CoordinatorState {
	fn default() -> Self {
		Self {
			access_token: None,
			renewal: RenewalState::Idle,
			recovery: RecoveryState::Idle,
			next_id: 0,
		}
	}
}
