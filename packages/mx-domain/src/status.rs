use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lifecycle of a persisted match row. The status field is the only mutable
/// part of a match; every other attribute is immutable once created.
///
/// `proposed -> saved | dismissed`, `saved -> contacted | closed`,
/// `contacted -> closed`. `dismissed` and `closed` are terminal.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
	Proposed,
	Saved,
	Dismissed,
	Contacted,
	Closed,
}
impl MatchStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Proposed => "proposed",
			Self::Saved => "saved",
			Self::Dismissed => "dismissed",
			Self::Contacted => "contacted",
			Self::Closed => "closed",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"proposed" => Some(Self::Proposed),
			"saved" => Some(Self::Saved),
			"dismissed" => Some(Self::Dismissed),
			"contacted" => Some(Self::Contacted),
			"closed" => Some(Self::Closed),
			_ => None,
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Dismissed | Self::Closed)
	}

	/// Same-state transitions are allowed so the status update surface stays
	/// idempotent under retries.
	pub fn can_transition(self, to: Self) -> bool {
		if self == to {
			return true;
		}

		matches!(
			(self, to),
			(Self::Proposed, Self::Saved)
				| (Self::Proposed, Self::Dismissed)
				| (Self::Saved, Self::Contacted)
				| (Self::Saved, Self::Closed)
				| (Self::Contacted, Self::Closed)
		)
	}

	pub fn transition(self, to: Self) -> Result<Self> {
		if !self.can_transition(to) {
			return Err(Error::InvalidTransition { from: self, to });
		}

		Ok(to)
	}
}
impl std::fmt::Display for MatchStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn full_accept_path_succeeds_in_sequence() {
		let status = MatchStatus::Proposed
			.transition(MatchStatus::Saved)
			.and_then(|status| status.transition(MatchStatus::Contacted))
			.and_then(|status| status.transition(MatchStatus::Closed))
			.expect("expected the accept path to succeed");

		assert_eq!(status, MatchStatus::Closed);
	}

	#[test]
	fn contacted_is_unreachable_directly_from_proposed() {
		assert!(matches!(
			MatchStatus::Proposed.transition(MatchStatus::Contacted),
			Err(Error::InvalidTransition { from: MatchStatus::Proposed, to: MatchStatus::Contacted })
		));
		assert!(MatchStatus::Proposed.transition(MatchStatus::Closed).is_err());
	}

	#[test]
	fn terminal_states_reject_every_exit() {
		for terminal in [MatchStatus::Dismissed, MatchStatus::Closed] {
			for target in
				[MatchStatus::Proposed, MatchStatus::Saved, MatchStatus::Contacted]
			{
				assert!(terminal.transition(target).is_err());
			}
		}
	}

	#[test]
	fn same_state_transition_is_an_idempotent_success() {
		for status in [
			MatchStatus::Proposed,
			MatchStatus::Saved,
			MatchStatus::Dismissed,
			MatchStatus::Contacted,
			MatchStatus::Closed,
		] {
			assert_eq!(status.transition(status).expect("expected idempotent success"), status);
		}
	}
}
