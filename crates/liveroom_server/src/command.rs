#![forbid(unsafe_code)]

use liveroom_domain::{ChannelId, CurrentMaterial, PollingOptions, UserId, WhiteboardZoomState};

/// An intent to mutate the shared state of one live room.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
	pub commander_id: UserId,
	pub channel_id: ChannelId,
	pub action: CommandAction,
}

impl Command {
	pub fn new(commander_id: UserId, channel_id: ChannelId, action: CommandAction) -> Self {
		Self {
			commander_id,
			channel_id,
			action,
		}
	}

	/// Same commander and channel, different action.
	pub fn derive(&self, action: CommandAction) -> Self {
		Self {
			commander_id: self.commander_id.clone(),
			channel_id: self.channel_id.clone(),
			action,
		}
	}

	pub fn name(&self) -> &'static str {
		self.action.name()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
	ShareMaterial {
		material: CurrentMaterial,
	},
	StopSharingMaterial,

	FoldHandAll,
	UpdateHandsUp {
		user_id: UserId,
		value: bool,
	},

	UpdateAnnotation {
		user_ids: Vec<UserId>,
		value: bool,
	},
	EnableAllAnnotation,
	DisableAllAnnotation,

	StartPolling {
		options: PollingOptions,
		question: String,
	},
	StopPolling,
	EndPolling,
	SharePolling {
		is_shared: bool,
	},
	SubmitPollingAnswer {
		user_id: UserId,
		answers: Vec<String>,
	},
	ResetPolling,

	RequestRecording,
	StopRecording,
	ResetRecording,

	Spotlight {
		user_id: UserId,
		is_enabled: bool,
	},
	WhiteboardZoomState {
		state: WhiteboardZoomState,
	},

	UpdateChat {
		user_ids: Vec<UserId>,
		value: bool,
	},
	ResetAllChat,

	UpsertSessionTime,

	/// Composite: returns every shared state of the room to its initial value.
	ResetAllStates,
}

impl CommandAction {
	pub fn name(&self) -> &'static str {
		match self {
			CommandAction::ShareMaterial { .. } => "ShareMaterial",
			CommandAction::StopSharingMaterial => "StopSharingMaterial",
			CommandAction::FoldHandAll => "FoldHandAll",
			CommandAction::UpdateHandsUp { .. } => "UpdateHandsUp",
			CommandAction::UpdateAnnotation { .. } => "UpdateAnnotation",
			CommandAction::EnableAllAnnotation => "EnableAllAnnotation",
			CommandAction::DisableAllAnnotation => "DisableAllAnnotation",
			CommandAction::StartPolling { .. } => "StartPolling",
			CommandAction::StopPolling => "StopPolling",
			CommandAction::EndPolling => "EndPolling",
			CommandAction::SharePolling { .. } => "SharePolling",
			CommandAction::SubmitPollingAnswer { .. } => "SubmitPollingAnswer",
			CommandAction::ResetPolling => "ResetPolling",
			CommandAction::RequestRecording => "RequestRecording",
			CommandAction::StopRecording => "StopRecording",
			CommandAction::ResetRecording => "ResetRecording",
			CommandAction::Spotlight { .. } => "Spotlight",
			CommandAction::WhiteboardZoomState { .. } => "WhiteboardZoomState",
			CommandAction::UpdateChat { .. } => "UpdateChat",
			CommandAction::ResetAllChat => "ResetAllChat",
			CommandAction::UpsertSessionTime => "UpsertSessionTime",
			CommandAction::ResetAllStates => "ResetAllStates",
		}
	}
}
