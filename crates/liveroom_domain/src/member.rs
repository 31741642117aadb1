#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChannelId, ParseIdError, UserId};

/// Kind of per-member state tracked for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStateType {
	HandsUp,
	Annotation,
	Chat,
	PollingAnswer,
}

impl MemberStateType {
	pub const ALL: [MemberStateType; 4] = [
		MemberStateType::HandsUp,
		MemberStateType::Annotation,
		MemberStateType::Chat,
		MemberStateType::PollingAnswer,
	];

	/// Stable string identifier, also the value stored in the database.
	pub const fn as_str(self) -> &'static str {
		match self {
			MemberStateType::HandsUp => "hands_up",
			MemberStateType::Annotation => "annotation",
			MemberStateType::Chat => "chat",
			MemberStateType::PollingAnswer => "polling_answer",
		}
	}
}

impl fmt::Display for MemberStateType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MemberStateType {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}
		Self::ALL
			.into_iter()
			.find(|t| t.as_str() == s)
			.ok_or_else(|| ParseIdError::InvalidFormat(format!("unknown member state type: {s}")))
	}
}

/// Value written for a member state: a flag and a string list (polling answers).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateValue {
	pub bool_value: bool,
	#[serde(default)]
	pub string_array_value: Vec<String>,
}

impl StateValue {
	pub fn flag(value: bool) -> Self {
		Self {
			bool_value: value,
			string_array_value: Vec::new(),
		}
	}

	pub fn answers(answers: Vec<String>) -> Self {
		Self {
			bool_value: false,
			string_array_value: answers,
		}
	}

	/// The value a polling answer is reset to.
	pub fn cleared() -> Self {
		Self::default()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRoomMemberState {
	pub channel_id: ChannelId,
	pub user_id: UserId,
	pub state_type: MemberStateType,
	pub value: StateValue,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}
