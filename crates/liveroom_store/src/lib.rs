#![forbid(unsafe_code)]

//! SQLite repositories for live room state.
//!
//! Every repository method takes the caller's `SqliteConnection`. Callers decide
//! the transaction scope; repositories never open or commit transactions.

pub mod activity_log;
pub mod db;
pub mod error;
pub mod live_room;
pub mod live_room_log;
pub mod member_state;
pub mod poll;
pub mod state;
pub mod students;

#[cfg(test)]
mod state_tests;

pub use activity_log::{ActivityLog, LiveRoomActivityLogRepo, SqliteActivityLogRepo};
pub use db::{DatabaseSettings, connect, connect_in_memory, run_migrations};
pub use error::StoreError;
pub use live_room::{LiveRoomRepo, SqliteLiveRoomRepo};
pub use live_room_log::{LiveRoomLog, LiveRoomLogRepo, LogCounter, SqliteLiveRoomLogRepo};
pub use member_state::{LiveRoomMemberStateRepo, MemberStatesFilter, SqliteMemberStateRepo};
pub use poll::{LiveRoomPollRepo, SqlitePollRepo};
pub use state::{LiveRoomStateRepo, SqliteStateRepo, StateField};
pub use students::{SqliteStudentsRepo, StudentsRepo};

/// Connection type every repository operates on. A `Transaction` derefs to it.
pub type Conn = sqlx::SqliteConnection;
