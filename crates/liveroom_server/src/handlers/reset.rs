#![forbid(unsafe_code)]

use liveroom_domain::WhiteboardZoomState;
use liveroom_store::Conn;
use tracing::{info, warn};

use super::CommandHandler;
use crate::command::{Command, CommandAction};
use crate::dispatcher::Dispatcher;
use crate::error::CommandError;

/// Steps of a full room reset, in execution order.
pub(crate) fn reset_steps(command: &Command) -> Vec<Command> {
	vec![
		command.derive(CommandAction::StopSharingMaterial),
		command.derive(CommandAction::EnableAllAnnotation),
		command.derive(CommandAction::FoldHandAll),
		command.derive(CommandAction::ResetPolling),
		command.derive(CommandAction::WhiteboardZoomState {
			state: WhiteboardZoomState::default(),
		}),
		command.derive(CommandAction::Spotlight {
			user_id: command.commander_id.clone(),
			is_enabled: false,
		}),
		command.derive(CommandAction::ResetAllChat),
		command.derive(CommandAction::ResetRecording),
	]
}

/// Runs every reset step on the caller's connection. The first failing step
/// aborts the rest; the dispatcher then rolls back the whole transaction.
pub(super) struct ResetAllStates<'a> {
	pub dispatcher: &'a Dispatcher,
	pub command: &'a Command,
}

#[async_trait::async_trait]
impl CommandHandler for ResetAllStates<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		for step in reset_steps(self.command) {
			if let Err(e) = self.dispatcher.dispatch_with_transaction(conn, &step).await {
				warn!(
					channel_id = %self.command.channel_id,
					step = step.name(),
					error = %e,
					"reset all states aborted"
				);
				return Err(CommandError::SubCommand {
					command: step.name(),
					source: Box::new(e),
				});
			}
		}

		info!(channel_id = %self.command.channel_id, "all room states reset");
		Ok(())
	}
}
