#![forbid(unsafe_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterialError {
	#[error("material media id must not be empty")]
	EmptyMediaId,
	#[error("material can not carry both video and audio state")]
	ConflictingPlayerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
	Playing,
	Pause,
	Ended,
}

/// Playback position of a shared video or audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPlayerState {
	#[serde(with = "duration_ms")]
	pub current_time: Duration,
	pub player_state: PlayerState,
}

/// Material currently shared with the whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentMaterial {
	pub media_id: String,
	pub updated_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub video_state: Option<MediaPlayerState>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audio_state: Option<MediaPlayerState>,
}

impl CurrentMaterial {
	pub fn new(media_id: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
		Self {
			media_id: media_id.into(),
			updated_at,
			video_state: None,
			audio_state: None,
		}
	}

	pub fn with_video(mut self, state: MediaPlayerState) -> Self {
		self.video_state = Some(state);
		self
	}

	pub fn with_audio(mut self, state: MediaPlayerState) -> Self {
		self.audio_state = Some(state);
		self
	}

	pub fn validate(&self) -> Result<(), MaterialError> {
		if self.media_id.trim().is_empty() {
			return Err(MaterialError::EmptyMediaId);
		}
		if self.video_state.is_some() && self.audio_state.is_some() {
			return Err(MaterialError::ConflictingPlayerState);
		}
		Ok(())
	}
}

mod duration_ms {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer, ser};

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		let ms = u64::try_from(d.as_millis()).map_err(ser::Error::custom)?;
		s.serialize_u64(ms)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		u64::deserialize(d).map(Duration::from_millis)
	}
}
