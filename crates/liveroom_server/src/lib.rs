#![forbid(unsafe_code)]

//! Command dispatch and state coordination for live classrooms.
//!
//! A [`Command`] names one mutation of a room's shared state. The
//! [`Dispatcher`] checks who may issue it, resolves its handler and runs it in
//! a single SQLite transaction. [`LiveRoomService`] adds the room lifecycle and
//! publish admission on top.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
mod handlers;
pub mod health;
pub mod permission;
pub mod repos;
pub mod service;
pub mod whiteboard;


pub use command::{Command, CommandAction};
pub use dispatcher::Dispatcher;
pub use error::{CommandError, Denied};
pub use handlers::CommandHandler;
pub use permission::{PermissionChecker, Rule};
pub use repos::Repositories;
pub use service::{JoinLiveRoomResponse, LiveRoomService, LiveRoomSnapshot, PreparePublishStatus, UnpublishStatus};
pub use whiteboard::{LocalWhiteboard, WhiteboardClient, WhiteboardError};
