#![forbid(unsafe_code)]

mod common;

use common::*;
use liveroom_domain::{MemberStateType, WhiteboardZoomState};
use liveroom_server::{CommandAction, CommandError, Denied};
use liveroom_store::{LiveRoomLog, StoreError};

#[tokio::test]
async fn join_creates_the_room_once() {
	let h = setup().await;

	let first = h.service.join_live_room("physics-101", &teacher()).await.expect("teacher joins");
	assert!(!first.is_student);
	assert!(!first.whiteboard_room_id.is_empty());
	assert!(!first.whiteboard_token.is_empty());

	let second = h.service.join_live_room("physics-101", &user("s1")).await.expect("student joins");
	assert!(second.is_student);
	assert_eq!(second.channel_id, first.channel_id);
	assert_eq!(second.whiteboard_room_id, first.whiteboard_room_id);
	assert_ne!(second.whiteboard_token, first.whiteboard_token);

	assert_eq!(h.whiteboard.rooms_created(), 1);
}

async fn session_log(h: &Harness, ch: &liveroom_domain::ChannelId) -> LiveRoomLog {
	let mut conn = h.pool.acquire().await.expect("conn");
	h.dispatcher
		.repos()
		.live_room_log
		.get_latest_by_channel_id(&mut *conn, ch)
		.await
		.expect("session log")
}

#[tokio::test]
async fn session_log_follows_the_room_from_join_to_end() {
	let h = setup().await;

	let ch = h.service.join_live_room("math", &teacher()).await.expect("teacher joins").channel_id;
	h.service.join_live_room("math", &user("s1")).await.expect("s1 joins");
	h.service.join_live_room("math", &teacher()).await.expect("teacher rejoins");

	let log = session_log(&h, &ch).await;
	assert_eq!(log.attendee_ids, vec![teacher(), user("s1")]);
	assert!(!log.is_completed);
	let first_log_id = log.log_id;

	h.teacher_runs(&ch, share_material("media-1")).await;
	h.teacher_runs(&ch, CommandAction::FoldHandAll).await;
	h.run(&user("s1"), &ch, CommandAction::FoldHandAll)
		.await
		.expect_err("students cannot fold every hand");
	h.service.get_live_room_state(&ch).await.expect("read state");

	let log = session_log(&h, &ch).await;
	assert_eq!(log.total_times_updating_room_state, 2);
	assert_eq!(log.total_times_getting_room_state, 1);

	h.service.end_live_room(&ch, &teacher()).await.expect("end");
	let log = session_log(&h, &ch).await;
	assert!(log.is_completed);
	assert_eq!(log.log_id, first_log_id);

	h.service.join_live_room("math", &user("s2")).await.expect("s2 joins later");
	let log = session_log(&h, &ch).await;
	assert_ne!(log.log_id, first_log_id);
	assert_eq!(log.attendee_ids, vec![user("s2")]);
	assert!(!log.is_completed);
}

#[tokio::test]
async fn join_backfills_a_missing_whiteboard_room() {
	let h = setup().await;
	let ch = channel("legacy");
	{
		let mut conn = h.pool.acquire().await.expect("conn");
		h.dispatcher
			.repos()
			.live_room
			.create_live_room(&mut *conn, &ch, "legacy-room", "")
			.await
			.expect("seed room without whiteboard");
	}

	let joined = h.service.join_live_room("legacy-room", &teacher()).await.expect("join");
	assert_eq!(joined.channel_id, ch);
	assert!(!joined.whiteboard_room_id.is_empty());

	let mut conn = h.pool.acquire().await.expect("conn");
	let room = h
		.dispatcher
		.repos()
		.live_room
		.get_by_id(&mut *conn, &ch)
		.await
		.expect("room");
	assert_eq!(room.whiteboard_room_id, joined.whiteboard_room_id);
}

#[tokio::test]
async fn join_rejects_a_blank_name() {
	let h = setup().await;
	let err = h.service.join_live_room("  ", &teacher()).await.expect_err("blank name");
	assert!(matches!(err, CommandError::InvalidArgument(_)));
}

#[tokio::test]
async fn end_live_room_resets_and_marks_ended() {
	let h = setup().await;
	let joined = h.service.join_live_room("chemistry", &teacher()).await.expect("join");
	let ch = joined.channel_id;

	h.run(&user("s1"), &ch, share_material("slides")).await.expect("share");
	h.teacher_runs(&ch, start_polling()).await;

	let err = h.service.end_live_room(&ch, &user("s1")).await.expect_err("student ends");
	assert!(matches!(err, CommandError::PermissionDenied(Denied::StudentNotAllowed)));

	h.service.end_live_room(&ch, &teacher()).await.expect("teacher ends");

	let state = h.state(&ch).await;
	assert!(state.current_material.is_none());
	assert!(state.current_polling.is_none());

	let mut conn = h.pool.acquire().await.expect("conn");
	let room = h
		.dispatcher
		.repos()
		.live_room
		.get_by_id(&mut *conn, &ch)
		.await
		.expect("room");
	assert!(room.is_ended());
}

#[tokio::test]
async fn end_unknown_room_fails_without_side_effects() {
	let h = setup().await;
	let ch = channel("ghost");
	h.run(&user("s1"), &ch, share_material("slides")).await.expect("share");

	let err = h.service.end_live_room(&ch, &teacher()).await.expect_err("no such room");
	assert!(matches!(
		err.root(),
		CommandError::Store {
			source: StoreError::ChannelNotFound,
			..
		}
	));
	assert!(h.state(&ch).await.current_material.is_some());
}

#[tokio::test]
async fn unknown_channel_reads_as_empty_state() {
	let h = setup().await;
	let ch = channel("fresh");

	let snapshot = h.service.get_live_room_state(&ch).await.expect("snapshot");
	assert_eq!(snapshot.state.channel_id, ch);
	assert!(snapshot.state.current_polling.is_none());
	assert_eq!(snapshot.state.stream_learner_counter, 0);
	assert!(snapshot.member_states.is_empty());
}

#[tokio::test]
async fn spotlight_and_zoom_round_trip() {
	let h = setup().await;
	let ch = channel("c1");

	h.teacher_runs(
		&ch,
		CommandAction::Spotlight {
			user_id: user("s3"),
			is_enabled: true,
		},
	)
	.await;
	assert_eq!(h.state(&ch).await.spotlighted_user, Some(user("s3")));

	h.teacher_runs(
		&ch,
		CommandAction::Spotlight {
			user_id: user("s3"),
			is_enabled: false,
		},
	)
	.await;
	assert!(h.state(&ch).await.spotlighted_user.is_none());

	let bad = WhiteboardZoomState {
		pdf_scale_ratio: 0.0,
		..WhiteboardZoomState::default()
	};
	let err = h
		.run(&teacher(), &ch, CommandAction::WhiteboardZoomState { state: bad })
		.await
		.expect_err("zero scale");
	assert!(matches!(err.root(), CommandError::ZoomState(_)));
	assert!(h.state(&ch).await.whiteboard_zoom_state.is_none());
}

#[tokio::test]
async fn member_flags_need_at_least_one_user() {
	let h = setup().await;
	let ch = channel("c1");

	let err = h
		.run(
			&teacher(),
			&ch,
			CommandAction::UpdateChat {
				user_ids: Vec::new(),
				value: false,
			},
		)
		.await
		.expect_err("empty user list");
	assert!(matches!(err.root(), CommandError::InvalidArgument(_)));

	h.teacher_runs(
		&ch,
		CommandAction::UpdateChat {
			user_ids: vec![user("s1"), user("s2")],
			value: false,
		},
	)
	.await;
	h.teacher_runs(&ch, CommandAction::DisableAllAnnotation).await;

	let chat = h.members(&ch, MemberStateType::Chat).await;
	assert_eq!(chat.len(), 2);
	assert!(chat.iter().all(|m| !m.value.bool_value));
	// Channel-wide updates only touch existing rows.
	assert!(h.members(&ch, MemberStateType::Annotation).await.is_empty());
}

#[tokio::test]
async fn session_time_is_recorded() {
	let h = setup().await;
	let ch = channel("c1");

	h.teacher_runs(&ch, CommandAction::UpsertSessionTime).await;
	assert!(h.state(&ch).await.session_time.is_some_and(approx_now));
}
