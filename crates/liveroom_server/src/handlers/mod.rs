#![forbid(unsafe_code)]

//! One handler per command variant.
//!
//! Handlers run against the connection they are given and never open, commit or
//! roll back transactions; the [`Dispatcher`] owns the transaction scope.

mod material;
mod member;
mod polling;
mod recording;
mod reset;
mod room;

use liveroom_domain::{ChannelId, LiveRoomState, MemberStateType, StateValue};
use liveroom_store::{Conn, LiveRoomStateRepo, StoreError};

use crate::command::{Command, CommandAction};
use crate::dispatcher::Dispatcher;
use crate::error::{CommandError, store_err};

#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError>;
}

/// Bind a command to its handler. Every variant is matched explicitly.
pub(crate) fn resolve<'a>(dispatcher: &'a Dispatcher, command: &'a Command) -> Box<dyn CommandHandler + 'a> {
	let repos = dispatcher.repos();
	let channel_id = &command.channel_id;
	let state = repos.state.as_ref();
	let members = repos.member_state.as_ref();

	match &command.action {
		CommandAction::ShareMaterial { material } => Box::new(material::ShareMaterial {
			channel_id,
			material,
			state,
		}),
		CommandAction::StopSharingMaterial => Box::new(material::StopSharingMaterial { channel_id, state }),

		CommandAction::FoldHandAll => Box::new(member::UpdateAllMembers {
			channel_id,
			state_type: MemberStateType::HandsUp,
			value: StateValue::flag(false),
			members,
		}),
		CommandAction::UpdateHandsUp { user_id, value } => Box::new(member::UpdateMembers {
			channel_id,
			user_ids: std::slice::from_ref(user_id),
			state_type: MemberStateType::HandsUp,
			value: *value,
			members,
		}),

		CommandAction::UpdateAnnotation { user_ids, value } => Box::new(member::UpdateMembers {
			channel_id,
			user_ids,
			state_type: MemberStateType::Annotation,
			value: *value,
			members,
		}),
		CommandAction::EnableAllAnnotation => Box::new(member::UpdateAllMembers {
			channel_id,
			state_type: MemberStateType::Annotation,
			value: StateValue::flag(true),
			members,
		}),
		CommandAction::DisableAllAnnotation => Box::new(member::UpdateAllMembers {
			channel_id,
			state_type: MemberStateType::Annotation,
			value: StateValue::flag(false),
			members,
		}),

		CommandAction::StartPolling { options, question } => Box::new(polling::StartPolling {
			channel_id,
			options,
			question,
			state,
		}),
		CommandAction::StopPolling => Box::new(polling::StopPolling { channel_id, state }),
		CommandAction::EndPolling => Box::new(polling::EndPolling {
			channel_id,
			state,
			members,
			polls: repos.poll.as_ref(),
		}),
		CommandAction::SharePolling { is_shared } => Box::new(polling::SharePolling {
			channel_id,
			is_shared: *is_shared,
			state,
		}),
		CommandAction::SubmitPollingAnswer { user_id, answers } => Box::new(polling::SubmitPollingAnswer {
			channel_id,
			user_id,
			answers,
			state,
			members,
		}),
		CommandAction::ResetPolling => Box::new(polling::ResetPolling {
			channel_id,
			state,
			members,
		}),

		CommandAction::RequestRecording => Box::new(recording::RequestRecording {
			channel_id,
			commander_id: &command.commander_id,
			state,
		}),
		CommandAction::StopRecording => Box::new(recording::StopRecording {
			channel_id,
			commander_id: &command.commander_id,
			state,
		}),
		CommandAction::ResetRecording => Box::new(recording::ResetRecording { channel_id, state }),

		CommandAction::Spotlight { user_id, is_enabled } => Box::new(room::Spotlight {
			channel_id,
			user_id,
			is_enabled: *is_enabled,
			state,
		}),
		CommandAction::WhiteboardZoomState { state: zoom } => Box::new(room::UpdateWhiteboardZoom {
			channel_id,
			zoom,
			state,
		}),

		CommandAction::UpdateChat { user_ids, value } => Box::new(member::UpdateMembers {
			channel_id,
			user_ids,
			state_type: MemberStateType::Chat,
			value: *value,
			members,
		}),
		CommandAction::ResetAllChat => Box::new(member::UpdateAllMembers {
			channel_id,
			state_type: MemberStateType::Chat,
			value: StateValue::flag(true),
			members,
		}),

		CommandAction::UpsertSessionTime => Box::new(room::UpsertSessionTime { channel_id, state }),

		CommandAction::ResetAllStates => Box::new(reset::ResetAllStates { dispatcher, command }),
	}
}

/// Current state of the channel, or `None` when it has no state row yet.
pub(crate) async fn load_state(
	state: &dyn LiveRoomStateRepo,
	conn: &mut Conn,
	channel_id: &ChannelId,
) -> Result<Option<LiveRoomState>, CommandError> {
	match state.get_state_by_channel_id(conn, channel_id).await {
		Ok(s) => Ok(Some(s)),
		Err(StoreError::ChannelNotFound) => Ok(None),
		Err(e) => Err(store_err("state.get_state_by_channel_id")(e)),
	}
}
