#![forbid(unsafe_code)]

mod common;

use common::*;
use liveroom_domain::PollingStatus;
use liveroom_server::Command;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commands_on_different_channels_do_not_fail_each_other() {
	let h = setup_with(HarnessOptions {
		on_disk: true,
		..HarnessOptions::default()
	})
	.await;
	let channels: Vec<_> = (0..8).map(|i| channel(&format!("ch{i}"))).collect();

	let tasks: Vec<_> = channels
		.iter()
		.map(|ch| {
			let dispatcher = h.dispatcher.clone();
			let command = Command::new(teacher(), ch.clone(), start_polling());
			tokio::spawn(async move { dispatcher.check_permission_and_dispatch(&command).await })
		})
		.collect();

	for (ch, task) in channels.iter().zip(tasks) {
		task.await
			.expect("task")
			.unwrap_or_else(|e| panic!("StartPolling on {ch} failed: {e}"));
	}

	for ch in &channels {
		let polling = h.state(ch).await.current_polling.expect("polling started");
		assert_eq!(polling.status, PollingStatus::Started);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commands_on_one_channel_all_commit() {
	let h = setup_with(HarnessOptions {
		on_disk: true,
		..HarnessOptions::default()
	})
	.await;
	let ch = channel("c1");

	let tasks: Vec<_> = ["s1", "s2", "s3", "s4"]
		.into_iter()
		.map(|id| {
			let dispatcher = h.dispatcher.clone();
			let command = Command::new(
				user(id),
				ch.clone(),
				liveroom_server::CommandAction::UpdateHandsUp {
					user_id: user(id),
					value: true,
				},
			);
			tokio::spawn(async move { dispatcher.check_permission_and_dispatch(&command).await })
		})
		.collect();

	for task in tasks {
		task.await.expect("task").expect("hand raised");
	}

	let raised = h.members(&ch, liveroom_domain::MemberStateType::HandsUp).await;
	assert_eq!(raised.len(), 4);
	assert!(raised.iter().all(|m| m.value.bool_value));
}
