#![forbid(unsafe_code)]

use std::sync::Arc;

use liveroom_domain::UserId;
use liveroom_store::{Conn, StudentsRepo};
use tracing::info;

use crate::command::{Command, CommandAction};
use crate::error::{CommandError, Denied, store_err};

/// Who may issue a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule<'a> {
	/// No role restriction.
	Anyone,
	/// Teachers and staff only.
	TeacherOnly,
	/// Students only, and only for themselves.
	StudentSelf { target: &'a UserId },
	/// Teachers for anyone; students only for themselves.
	TeacherOrStudentSelf { target: &'a UserId },
}

impl<'a> Rule<'a> {
	pub fn for_action(action: &'a CommandAction) -> Self {
		match action {
			CommandAction::ShareMaterial { .. } | CommandAction::StopSharingMaterial => Rule::Anyone,
			CommandAction::SubmitPollingAnswer { user_id, .. } => Rule::StudentSelf { target: user_id },
			CommandAction::UpdateHandsUp { user_id, .. } => Rule::TeacherOrStudentSelf { target: user_id },
			CommandAction::FoldHandAll
			| CommandAction::UpdateAnnotation { .. }
			| CommandAction::EnableAllAnnotation
			| CommandAction::DisableAllAnnotation
			| CommandAction::StartPolling { .. }
			| CommandAction::StopPolling
			| CommandAction::EndPolling
			| CommandAction::SharePolling { .. }
			| CommandAction::ResetPolling
			| CommandAction::RequestRecording
			| CommandAction::StopRecording
			| CommandAction::ResetRecording
			| CommandAction::Spotlight { .. }
			| CommandAction::WhiteboardZoomState { .. }
			| CommandAction::UpdateChat { .. }
			| CommandAction::ResetAllChat
			| CommandAction::UpsertSessionTime
			| CommandAction::ResetAllStates => Rule::TeacherOnly,
		}
	}

	/// Decide given the commander's role.
	pub fn evaluate(self, commander: &UserId, is_student: bool) -> Result<(), Denied> {
		match self {
			Rule::Anyone => Ok(()),
			Rule::TeacherOnly if is_student => Err(Denied::StudentNotAllowed),
			Rule::TeacherOnly => Ok(()),
			Rule::StudentSelf { .. } if !is_student => Err(Denied::NotAStudent),
			Rule::StudentSelf { target } | Rule::TeacherOrStudentSelf { target } if is_student && target != commander => {
				Err(Denied::TargetsAnotherUser)
			}
			Rule::StudentSelf { .. } | Rule::TeacherOrStudentSelf { .. } => Ok(()),
		}
	}
}

#[derive(Clone)]
pub struct PermissionChecker {
	students: Arc<dyn StudentsRepo>,
}

impl PermissionChecker {
	pub fn new(students: Arc<dyn StudentsRepo>) -> Self {
		Self { students }
	}

	pub async fn is_student(&self, conn: &mut Conn, user_id: &UserId) -> Result<bool, CommandError> {
		self.students
			.is_user_id_a_student(conn, user_id)
			.await
			.map_err(store_err("students.is_user_id_a_student"))
	}

	pub async fn check(&self, conn: &mut Conn, command: &Command) -> Result<(), CommandError> {
		let rule = Rule::for_action(&command.action);
		if rule == Rule::Anyone {
			return Ok(());
		}

		let is_student = self.is_student(conn, &command.commander_id).await?;
		rule.evaluate(&command.commander_id, is_student).map_err(|denied| {
			info!(
				command = command.name(),
				channel_id = %command.channel_id,
				commander_id = %command.commander_id,
				reason = %denied,
				"command rejected"
			);
			metrics::counter!("liveroom_permission_denied_total", "command" => command.name()).increment(1);
			CommandError::PermissionDenied(denied)
		})
	}
}
