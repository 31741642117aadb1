#![forbid(unsafe_code)]

use std::sync::Arc;

use liveroom_store::{
	LiveRoomActivityLogRepo, LiveRoomLogRepo, LiveRoomMemberStateRepo, LiveRoomPollRepo, LiveRoomRepo,
	LiveRoomStateRepo, SqliteActivityLogRepo, SqliteLiveRoomLogRepo, SqliteLiveRoomRepo, SqliteMemberStateRepo,
	SqlitePollRepo, SqliteStateRepo, SqliteStudentsRepo, StudentsRepo,
};

/// Repositories injected into handlers and services.
#[derive(Clone)]
pub struct Repositories {
	pub live_room: Arc<dyn LiveRoomRepo>,
	pub state: Arc<dyn LiveRoomStateRepo>,
	pub member_state: Arc<dyn LiveRoomMemberStateRepo>,
	pub poll: Arc<dyn LiveRoomPollRepo>,
	pub activity_log: Arc<dyn LiveRoomActivityLogRepo>,
	pub live_room_log: Arc<dyn LiveRoomLogRepo>,
	pub students: Arc<dyn StudentsRepo>,
}

impl Repositories {
	pub fn sqlite() -> Self {
		Self {
			live_room: Arc::new(SqliteLiveRoomRepo),
			state: Arc::new(SqliteStateRepo),
			member_state: Arc::new(SqliteMemberStateRepo),
			poll: Arc::new(SqlitePollRepo),
			activity_log: Arc::new(SqliteActivityLogRepo),
			live_room_log: Arc::new(SqliteLiveRoomLogRepo),
			students: Arc::new(SqliteStudentsRepo),
		}
	}
}
