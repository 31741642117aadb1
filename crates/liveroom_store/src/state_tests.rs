#![forbid(unsafe_code)]

use chrono::Utc;
use liveroom_domain::{ChannelId, CurrentMaterial, Recording, UserId, WhiteboardZoomState};

use crate::{LiveRoomStateRepo, SqliteStateRepo, StoreError, connect_in_memory};

fn channel(id: &str) -> ChannelId {
	ChannelId::new(id).expect("valid ChannelId")
}

fn user(id: &str) -> UserId {
	UserId::new(id).expect("valid UserId")
}

#[tokio::test]
async fn missing_state_is_channel_not_found() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");

	let err = SqliteStateRepo
		.get_state_by_channel_id(&mut conn, &channel("nope"))
		.await
		.expect_err("no row yet");
	assert!(err.is_channel_not_found(), "got: {err:?}");

	let err = SqliteStateRepo
		.get_streaming_learners(&mut conn, &channel("nope"), true)
		.await
		.expect_err("no row yet");
	assert!(err.is_channel_not_found(), "got: {err:?}");
}

#[tokio::test]
async fn admission_is_bounded_by_max() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");
	let repo = SqliteStateRepo;
	let ch = channel("ch-1");

	repo.increase_number_of_streaming(&mut conn, &ch, &user("l1"), 2)
		.await
		.expect("first learner admitted");
	repo.increase_number_of_streaming(&mut conn, &ch, &user("l2"), 2)
		.await
		.expect("second learner admitted");

	let err = repo
		.increase_number_of_streaming(&mut conn, &ch, &user("l3"), 2)
		.await
		.expect_err("third learner is over capacity");
	assert!(matches!(err, StoreError::NoChannelUpdated), "got: {err:?}");

	let state = repo.get_state_by_channel_id(&mut conn, &ch).await.expect("state");
	assert_eq!(state.stream_learner_counter, 2);
	assert_eq!(state.streaming_learners, vec![user("l1"), user("l2")]);
}

#[tokio::test]
async fn admission_is_idempotent_per_learner() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");
	let repo = SqliteStateRepo;
	let ch = channel("ch-1");

	repo.increase_number_of_streaming(&mut conn, &ch, &user("l1"), 5)
		.await
		.expect("admitted");
	let err = repo
		.increase_number_of_streaming(&mut conn, &ch, &user("l1"), 5)
		.await
		.expect_err("already streaming");
	assert!(err.is_no_channel_updated());

	let learners = repo.get_streaming_learners(&mut conn, &ch, false).await.expect("learners");
	assert_eq!(learners, vec![user("l1")]);
	let state = repo.get_state_by_channel_id(&mut conn, &ch).await.expect("state");
	assert_eq!(state.stream_learner_counter, 1);
}

#[tokio::test]
async fn zero_max_never_admits() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");

	let err = SqliteStateRepo
		.increase_number_of_streaming(&mut conn, &channel("ch"), &user("l1"), 0)
		.await
		.expect_err("max 0");
	assert!(err.is_no_channel_updated());
}

#[tokio::test]
async fn decrease_removes_learner_and_frees_a_slot() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");
	let repo = SqliteStateRepo;
	let ch = channel("ch-1");

	for l in ["l1", "l2"] {
		repo.increase_number_of_streaming(&mut conn, &ch, &user(l), 2)
			.await
			.expect("admitted");
	}

	repo.decrease_number_of_streaming(&mut conn, &ch, &user("l1"))
		.await
		.expect("l1 leaves");
	let err = repo
		.decrease_number_of_streaming(&mut conn, &ch, &user("l1"))
		.await
		.expect_err("l1 already left");
	assert!(err.is_no_channel_updated());

	let err = repo
		.decrease_number_of_streaming(&mut conn, &channel("other"), &user("l2"))
		.await
		.expect_err("unknown channel");
	assert!(err.is_no_channel_updated());

	repo.increase_number_of_streaming(&mut conn, &ch, &user("l3"), 2)
		.await
		.expect("slot was freed");

	let state = repo.get_state_by_channel_id(&mut conn, &ch).await.expect("state");
	assert_eq!(state.stream_learner_counter, 2);
	assert_eq!(state.streaming_learners, vec![user("l2"), user("l3")]);
	assert_eq!(state.stream_learner_counter as usize, state.streaming_learners.len());
}

#[tokio::test]
async fn field_upserts_replace_only_their_column() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");
	let repo = SqliteStateRepo;
	let ch = channel("ch-1");

	let material = CurrentMaterial::new("media-1", Utc::now());
	repo.upsert_current_material(&mut conn, &ch, Some(&material))
		.await
		.expect("material");
	repo.spotlight(&mut conn, &ch, &user("s1")).await.expect("spotlight");
	let zoom = WhiteboardZoomState {
		pdf_scale_ratio: 150.0,
		..WhiteboardZoomState::default()
	};
	repo.upsert_whiteboard_zoom_state(&mut conn, &ch, &zoom).await.expect("zoom");
	let recording = Recording {
		is_recording: true,
		creator: user("t1"),
	};
	repo.upsert_recording(&mut conn, &ch, Some(&recording))
		.await
		.expect("recording");

	let state = repo.get_state_by_channel_id(&mut conn, &ch).await.expect("state");
	assert_eq!(state.current_material.as_ref().map(|m| m.media_id.as_str()), Some("media-1"));
	assert_eq!(state.spotlighted_user, Some(user("s1")));
	assert_eq!(state.whiteboard_zoom_state, Some(zoom));
	assert_eq!(state.recording, Some(recording));
	assert!(state.current_polling.is_none());

	repo.un_spotlight(&mut conn, &ch).await.expect("unspotlight");
	repo.upsert_current_material(&mut conn, &ch, None).await.expect("clear material");

	let state = repo.get_state_by_channel_id(&mut conn, &ch).await.expect("state");
	assert!(state.spotlighted_user.is_none());
	assert!(state.current_material.is_none());
	assert_eq!(state.whiteboard_zoom_state, Some(zoom), "other columns untouched");
}

#[tokio::test]
async fn session_time_round_trips() {
	let pool = connect_in_memory().await.expect("pool");
	let mut conn = pool.acquire().await.expect("conn");
	let ch = channel("ch-1");
	let at = chrono::DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");

	SqliteStateRepo
		.upsert_session_time(&mut conn, &ch, at)
		.await
		.expect("session time");
	let state = SqliteStateRepo.get_state_by_channel_id(&mut conn, &ch).await.expect("state");
	assert_eq!(state.session_time, Some(at));
}
