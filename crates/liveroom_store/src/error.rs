#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("channel not found")]
	ChannelNotFound,
	#[error("no channel created")]
	NoChannelCreated,
	#[error("no channel updated")]
	NoChannelUpdated,
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("invalid row in {table}: {reason}")]
	InvalidRow { table: &'static str, reason: String },
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

impl StoreError {
	pub(crate) fn invalid_row(table: &'static str, reason: impl ToString) -> Self {
		StoreError::InvalidRow {
			table,
			reason: reason.to_string(),
		}
	}

	pub fn is_channel_not_found(&self) -> bool {
		matches!(self, StoreError::ChannelNotFound)
	}

	pub fn is_no_channel_updated(&self) -> bool {
		matches!(self, StoreError::NoChannelUpdated)
	}
}
