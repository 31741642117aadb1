#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;

fn parse(toml_src: &str) -> Config {
	let file: FileConfig = toml::from_str(toml_src).expect("valid toml");
	Config::from_file(file)
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
	let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
	move |key: &str| map.get(key).cloned()
}

#[test]
fn empty_file_yields_defaults() {
	let cfg = parse("");
	assert_eq!(cfg.database.url, "sqlite://liveroom.db?mode=rwc");
	assert_eq!(cfg.database.max_connections, 5);
	assert_eq!(cfg.liveroom.maximum_learner_streamings, 5);
	assert_eq!(cfg.liveroom.command_timeout, Duration::from_millis(5_000));
	assert!(cfg.server.health_bind.is_none());
	assert!(cfg.server.metrics_bind.is_none());
}

#[test]
fn file_values_are_used() {
	let cfg = parse(
		r#"
		[database]
		url = "sqlite://classes.db"
		max_connections = 2

		[liveroom]
		maximum_learner_streamings = 12
		command_timeout_ms = 250

		[server]
		health_bind = "127.0.0.1:9000"
		metrics_bind = "  "
		"#,
	);
	assert_eq!(cfg.database.url, "sqlite://classes.db");
	assert_eq!(cfg.database.max_connections, 2);
	assert_eq!(cfg.liveroom.maximum_learner_streamings, 12);
	assert_eq!(cfg.liveroom.command_timeout, Duration::from_millis(250));
	assert_eq!(cfg.server.health_bind.as_deref(), Some("127.0.0.1:9000"));
	assert!(cfg.server.metrics_bind.is_none());
}

#[test]
fn zero_limits_fall_back_to_defaults() {
	let cfg = parse(
		r#"
		[liveroom]
		maximum_learner_streamings = 0
		command_timeout_ms = 0
		"#,
	);
	assert_eq!(cfg.liveroom.maximum_learner_streamings, DEFAULT_MAXIMUM_LEARNER_STREAMINGS);
	assert_eq!(cfg.liveroom.command_timeout, Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS));
}

#[test]
fn env_overrides_win_over_file() {
	let mut cfg = parse("[liveroom]\nmaximum_learner_streamings = 3\n");
	apply_overrides(
		&mut cfg,
		env(&[
			("LIVEROOM_MAXIMUM_LEARNER_STREAMINGS", "8"),
			("LIVEROOM_DATABASE_URL", " sqlite::memory: "),
			("LIVEROOM_HEALTH_BIND", "0.0.0.0:8080"),
		]),
	);
	assert_eq!(cfg.liveroom.maximum_learner_streamings, 8);
	assert_eq!(cfg.database.url, "sqlite::memory:");
	assert_eq!(cfg.server.health_bind.as_deref(), Some("0.0.0.0:8080"));
}

#[test]
fn unparsable_env_values_are_ignored() {
	let mut cfg = parse("");
	apply_overrides(
		&mut cfg,
		env(&[
			("LIVEROOM_COMMAND_TIMEOUT_MS", "soon"),
			("LIVEROOM_DATABASE_MAX_CONNECTIONS", "0"),
			("LIVEROOM_METRICS_BIND", ""),
		]),
	);
	assert_eq!(cfg.liveroom.command_timeout, Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS));
	assert_eq!(cfg.database.max_connections, 5);
	assert!(cfg.server.metrics_bind.is_none());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
	fn text(&self) -> String {
		String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
	}
}

impl std::io::Write for CapturedLogs {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.0.lock().expect("log buffer").extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
	type Writer = CapturedLogs;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

#[test]
fn rejected_env_values_are_reported() {
	let logs = CapturedLogs::default();
	let subscriber = tracing_subscriber::fmt()
		.with_writer(logs.clone())
		.with_ansi(false)
		.finish();

	let mut cfg = parse("");
	tracing::subscriber::with_default(subscriber, || {
		apply_overrides(
			&mut cfg,
			env(&[
				("LIVEROOM_COMMAND_TIMEOUT_MS", "soon"),
				("LIVEROOM_MAXIMUM_LEARNER_STREAMINGS", "-3"),
				("LIVEROOM_DATABASE_MAX_CONNECTIONS", "0"),
			]),
		);
	});

	let text = logs.text();
	assert!(text.contains("LIVEROOM_COMMAND_TIMEOUT_MS"), "{text}");
	assert!(text.contains("LIVEROOM_MAXIMUM_LEARNER_STREAMINGS"), "{text}");
	assert!(text.contains("unparsable env override ignored"), "{text}");
	assert!(text.contains("max_connections must be positive"), "{text}");
	assert_eq!(cfg.liveroom.maximum_learner_streamings, DEFAULT_MAXIMUM_LEARNER_STREAMINGS);
	assert_eq!(cfg.database.max_connections, 5);
}

#[test]
fn missing_file_is_not_an_error() {
	let path = std::env::temp_dir().join(format!("liveroom-missing-{}.toml", uuid::Uuid::new_v4()));
	let read = read_toml_if_exists(&path).expect("missing file is fine");
	assert!(read.is_none());
}
