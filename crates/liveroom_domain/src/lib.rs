#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod material;
pub mod member;
pub mod polling;
pub mod room;


pub use material::{CurrentMaterial, MaterialError, MediaPlayerState, PlayerState};
pub use member::{LiveRoomMemberState, MemberStateType, StateValue};
pub use polling::{CurrentPolling, LiveRoomPoll, PollingError, PollingOption, PollingOptions, PollingStatus, StudentAnswer};
pub use room::{ActivityAction, LiveRoom, LiveRoomState, Recording, WhiteboardZoomState, ZoomStateError};

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a non-empty id. Surrounding whitespace is rejected rather than trimmed.
			pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
				let id = id.into();
				if id.trim().is_empty() {
					return Err(ParseIdError::Empty);
				}
				if id.trim() != id {
					return Err(ParseIdError::InvalidFormat(format!("surrounding whitespace in {id:?}")));
				}
				Ok(Self(id))
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_string(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseIdError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				$name::new(s.to_string())
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

string_id!(
	/// Live room (channel) identifier.
	ChannelId
);

string_id!(
	/// User identifier: a commander, a learner or a teacher.
	UserId
);
