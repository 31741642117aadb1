#![forbid(unsafe_code)]

//! In-session polling.
//!
//! A poll lives embedded in the channel state as [`CurrentPolling`] while it is
//! active. Its status only moves forward: `Started -> Stopped`, after which it is
//! either archived into a [`LiveRoomPoll`] and cleared, or reset to nothing.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChannelId, UserId};

/// Minimum number of options a poll must offer.
pub const MIN_POLLING_OPTIONS: usize = 2;
/// Maximum number of options a poll may offer.
pub const MAX_POLLING_OPTIONS: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollingError {
	#[error("options must contain at least {min} entries, got {got}")]
	TooFewOptions { min: usize, got: usize },
	#[error("options can not contain more than {max} entries, got {got}")]
	TooManyOptions { max: usize, got: usize },
	#[error("option answer key must not be empty")]
	EmptyAnswerKey,
	#[error("duplicate option answer key: {0}")]
	DuplicateAnswerKey(String),
	#[error("at least 1 correct answer")]
	NoCorrectAnswer,
	#[error("at least 1 answer")]
	NoAnswers,
	#[error("the answer {0} doesn't belong to options")]
	AnswerNotInOptions(String),
	#[error("the polling already exists")]
	AlreadyExists,
	#[error("the polling does not exist")]
	NotExists,
	#[error("polling is {actual}, expected {expected}")]
	UnexpectedStatus {
		expected: PollingStatus,
		actual: PollingStatus,
	},
	#[error("can only submit one time")]
	AlreadySubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollingStatus {
	Started,
	Stopped,
}

impl PollingStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			PollingStatus::Started => "started",
			PollingStatus::Stopped => "stopped",
		}
	}
}

impl core::fmt::Display for PollingStatus {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A selectable answer. `answer` is the key learners submit (e.g. `"A"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingOption {
	pub answer: String,
	pub is_correct: bool,
	#[serde(default)]
	pub content: String,
}

impl PollingOption {
	pub fn new(answer: impl Into<String>, is_correct: bool) -> Self {
		Self {
			answer: answer.into(),
			is_correct,
			content: String::new(),
		}
	}

	pub fn with_content(mut self, content: impl Into<String>) -> Self {
		self.content = content.into();
		self
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollingOptions(Vec<PollingOption>);

impl PollingOptions {
	pub fn new(options: Vec<PollingOption>) -> Self {
		Self(options)
	}

	pub fn as_slice(&self) -> &[PollingOption] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Check the option set itself: size bounds, non-empty unique keys and at
	/// least one correct option.
	pub fn validate(&self) -> Result<(), PollingError> {
		let got = self.0.len();
		if got < MIN_POLLING_OPTIONS {
			return Err(PollingError::TooFewOptions {
				min: MIN_POLLING_OPTIONS,
				got,
			});
		}
		if got > MAX_POLLING_OPTIONS {
			return Err(PollingError::TooManyOptions {
				max: MAX_POLLING_OPTIONS,
				got,
			});
		}

		self.validate_answers(&[])
	}

	/// Check submitted answers against the option keys. Shares the key and
	/// correctness checks with [`PollingOptions::validate`].
	pub fn validate_answers(&self, answers: &[String]) -> Result<(), PollingError> {
		let mut keys = HashSet::with_capacity(self.0.len());
		let mut has_correct = false;
		for option in &self.0 {
			if option.answer.trim().is_empty() {
				return Err(PollingError::EmptyAnswerKey);
			}
			if !keys.insert(option.answer.as_str()) {
				return Err(PollingError::DuplicateAnswerKey(option.answer.clone()));
			}
			has_correct |= option.is_correct;
		}
		if !has_correct {
			return Err(PollingError::NoCorrectAnswer);
		}

		for answer in answers {
			if !keys.contains(answer.as_str()) {
				return Err(PollingError::AnswerNotInOptions(answer.clone()));
			}
		}

		Ok(())
	}
}

impl From<Vec<PollingOption>> for PollingOptions {
	fn from(options: Vec<PollingOption>) -> Self {
		Self(options)
	}
}

/// The poll currently running in a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPolling {
	pub options: PollingOptions,
	#[serde(default)]
	pub question: String,
	pub status: PollingStatus,
	#[serde(default)]
	pub is_shared: bool,
	pub created_at: DateTime<Utc>,
	#[serde(default)]
	pub stopped_at: Option<DateTime<Utc>>,
	pub updated_at: DateTime<Utc>,
}

impl CurrentPolling {
	/// Start a new poll. Fails if `existing` already holds one.
	pub fn start(
		existing: Option<&CurrentPolling>,
		options: PollingOptions,
		question: impl Into<String>,
		now: DateTime<Utc>,
	) -> Result<Self, PollingError> {
		if existing.is_some() {
			return Err(PollingError::AlreadyExists);
		}
		options.validate()?;

		Ok(Self {
			options,
			question: question.into(),
			status: PollingStatus::Started,
			is_shared: false,
			created_at: now,
			stopped_at: None,
			updated_at: now,
		})
	}

	pub fn stop(mut self, now: DateTime<Utc>) -> Result<Self, PollingError> {
		self.expect_status(PollingStatus::Started)?;
		self.status = PollingStatus::Stopped;
		self.stopped_at = Some(now);
		self.updated_at = now;
		Ok(self)
	}

	pub fn share(mut self, is_shared: bool, now: DateTime<Utc>) -> Result<Self, PollingError> {
		self.expect_status(PollingStatus::Stopped)?;
		self.is_shared = is_shared;
		self.updated_at = now;
		Ok(self)
	}

	/// Validate a learner's submission against this poll. `previous` is the
	/// learner's stored answer for the channel, if any.
	pub fn check_submission(&self, answers: &[String], previous: Option<&[String]>) -> Result<(), PollingError> {
		if answers.is_empty() {
			return Err(PollingError::NoAnswers);
		}
		self.expect_status(PollingStatus::Started)?;
		self.options.validate_answers(answers)?;
		if previous.is_some_and(|p| !p.is_empty()) {
			return Err(PollingError::AlreadySubmitted);
		}
		Ok(())
	}

	/// Archive a stopped poll with the collected answers. Learners whose stored
	/// answer is empty are left out.
	pub fn end(
		self,
		poll_id: impl Into<String>,
		channel_id: ChannelId,
		answers: Vec<StudentAnswer>,
		now: DateTime<Utc>,
	) -> Result<LiveRoomPoll, PollingError> {
		self.expect_status(PollingStatus::Stopped)?;

		let students_answers = answers.into_iter().filter(|a| !a.answers.is_empty()).collect();
		Ok(LiveRoomPoll {
			poll_id: poll_id.into(),
			channel_id,
			options: self.options,
			question: self.question,
			students_answers,
			created_at: self.created_at,
			stopped_at: self.stopped_at,
			ended_at: now,
			updated_at: now,
		})
	}

	fn expect_status(&self, expected: PollingStatus) -> Result<(), PollingError> {
		if self.status != expected {
			return Err(PollingError::UnexpectedStatus {
				expected,
				actual: self.status,
			});
		}
		Ok(())
	}
}

/// One learner's answers as recorded in a poll archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAnswer {
	pub user_id: UserId,
	pub answers: Vec<String>,
	pub updated_at: DateTime<Utc>,
}

/// Archived poll, written once when a poll ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRoomPoll {
	pub poll_id: String,
	pub channel_id: ChannelId,
	pub options: PollingOptions,
	pub question: String,
	pub students_answers: Vec<StudentAnswer>,
	pub created_at: DateTime<Utc>,
	pub stopped_at: Option<DateTime<Utc>>,
	pub ended_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}
