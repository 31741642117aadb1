#![forbid(unsafe_code)]

use core::fmt;
use std::time::Duration;

use liveroom_domain::{ChannelId, MaterialError, PollingError, ZoomStateError};
use liveroom_store::StoreError;
use thiserror::Error;

use crate::command::Command;
use crate::whiteboard::WhiteboardError;

/// Why a commander was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
	/// The command is reserved for teachers and staff.
	StudentNotAllowed,
	/// The command is reserved for students.
	NotAStudent,
	/// A student tried to act on behalf of someone else.
	TargetsAnotherUser,
	/// Only the member who started the recording may stop it.
	NotRecordingCreator,
}

impl fmt::Display for Denied {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Denied::StudentNotAllowed => "only teachers can execute this command",
			Denied::NotAStudent => "commander is not a student",
			Denied::TargetsAnotherUser => "commander can only act on their own state",
			Denied::NotRecordingCreator => "only the recording creator can stop it",
		})
	}
}

#[derive(Debug, Error)]
pub enum CommandError {
	#[error("permission denied: {0}")]
	PermissionDenied(Denied),
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Polling(#[from] PollingError),
	#[error(transparent)]
	Material(#[from] MaterialError),
	#[error(transparent)]
	ZoomState(#[from] ZoomStateError),
	#[error("{operation}: {source}")]
	Store {
		operation: &'static str,
		#[source]
		source: StoreError,
	},
	#[error("whiteboard: {0}")]
	Whiteboard(#[from] WhiteboardError),
	#[error("deadline of {0:?} exceeded")]
	DeadlineExceeded(Duration),
	#[error("sub-command {command} failed: {source}")]
	SubCommand {
		command: &'static str,
		#[source]
		source: Box<CommandError>,
	},
	#[error("{command} on channel {channel_id}: {source}")]
	Failed {
		command: &'static str,
		channel_id: ChannelId,
		#[source]
		source: Box<CommandError>,
	},
}

impl CommandError {
	/// Attach the command name and channel. Permission errors stay unwrapped so
	/// callers can surface them verbatim.
	pub fn in_command(self, command: &Command) -> Self {
		self.in_operation(command.name(), &command.channel_id)
	}

	pub fn in_operation(self, operation: &'static str, channel_id: &ChannelId) -> Self {
		match self {
			CommandError::PermissionDenied(_) | CommandError::Failed { .. } => self,
			other => CommandError::Failed {
				command: operation,
				channel_id: channel_id.clone(),
				source: Box::new(other),
			},
		}
	}

	/// The innermost error, past `Failed` and `SubCommand` wrappers.
	pub fn root(&self) -> &CommandError {
		match self {
			CommandError::Failed { source, .. } | CommandError::SubCommand { source, .. } => source.root(),
			other => other,
		}
	}

	pub fn is_permission_denied(&self) -> bool {
		matches!(self.root(), CommandError::PermissionDenied(_))
	}

	pub fn is_deadline_exceeded(&self) -> bool {
		matches!(self.root(), CommandError::DeadlineExceeded(_))
	}
}

/// `map_err` adapter naming the repository operation that failed.
pub(crate) fn store_err(operation: &'static str) -> impl FnOnce(StoreError) -> CommandError {
	move |source| CommandError::Store { operation, source }
}

pub(crate) fn db_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> CommandError {
	move |e| CommandError::Store {
		operation,
		source: StoreError::Database(e),
	}
}
