#![forbid(unsafe_code)]

#[cfg(test)]
mod config_tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use liveroom_store::DatabaseSettings;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_MAXIMUM_LEARNER_STREAMINGS: u32 = 5;
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

/// Default config path: `~/.liveroom/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".liveroom").join("config.toml"))
}

/// Load the config from TOML (missing file means defaults) and `LIVEROOM_*`
/// env overrides.
pub fn load_config_from_path(path: &Path) -> anyhow::Result<Config> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = Config::from_file(file_cfg);
	apply_env_overrides(&mut cfg);
	Ok(cfg)
}

#[derive(Debug, Clone, Default)]
pub struct Config {
	pub database: DatabaseConfig,
	pub liveroom: LiveRoomSettings,
	pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		let defaults = DatabaseSettings::default();
		Self {
			url: defaults.url,
			max_connections: defaults.max_connections,
		}
	}
}

impl DatabaseConfig {
	pub fn settings(&self) -> DatabaseSettings {
		DatabaseSettings {
			url: self.url.clone(),
			max_connections: self.max_connections,
			..DatabaseSettings::default()
		}
	}
}

#[derive(Debug, Clone)]
pub struct LiveRoomSettings {
	/// Upper bound on learners publishing at once in one channel.
	pub maximum_learner_streamings: u32,
	/// Deadline for one command, transaction included.
	pub command_timeout: Duration,
}

impl Default for LiveRoomSettings {
	fn default() -> Self {
		Self {
			maximum_learner_streamings: DEFAULT_MAXIMUM_LEARNER_STREAMINGS,
			command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
	/// Optional metrics exporter bind address (host:port).
	pub metrics_bind: Option<String>,
	/// Optional health/readiness HTTP bind address (host:port).
	pub health_bind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	database: FileDatabaseSettings,

	#[serde(default)]
	liveroom: FileLiveRoomSettings,

	#[serde(default)]
	server: FileServerSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileDatabaseSettings {
	url: Option<String>,
	max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileLiveRoomSettings {
	maximum_learner_streamings: Option<u32>,
	command_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	metrics_bind: Option<String>,
	health_bind: Option<String>,
}

impl Config {
	fn from_file(file: FileConfig) -> Self {
		let db_defaults = DatabaseConfig::default();

		Self {
			database: DatabaseConfig {
				url: file.database.url.filter(|s| !s.trim().is_empty()).unwrap_or(db_defaults.url),
				max_connections: file
					.database
					.max_connections
					.filter(|v| *v > 0)
					.unwrap_or(db_defaults.max_connections),
			},
			liveroom: LiveRoomSettings {
				maximum_learner_streamings: streamings_or_default(file.liveroom.maximum_learner_streamings),
				command_timeout: timeout_or_default(file.liveroom.command_timeout_ms),
			},
			server: ServerSettings {
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				health_bind: file.server.health_bind.filter(|s| !s.trim().is_empty()),
			},
		}
	}
}

fn streamings_or_default(v: Option<u32>) -> u32 {
	match v {
		Some(0) => {
			warn!(
				default = DEFAULT_MAXIMUM_LEARNER_STREAMINGS,
				"maximum_learner_streamings must be positive; using default"
			);
			DEFAULT_MAXIMUM_LEARNER_STREAMINGS
		}
		Some(v) => v,
		None => DEFAULT_MAXIMUM_LEARNER_STREAMINGS,
	}
}

fn timeout_or_default(ms: Option<u64>) -> Duration {
	match ms {
		Some(0) => {
			warn!(default_ms = DEFAULT_COMMAND_TIMEOUT_MS, "command_timeout_ms must be positive; using default");
			Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS)
		}
		Some(ms) => Duration::from_millis(ms),
		None => Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn parse_override<T: std::str::FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
	let value = lookup(key)?;
	match value.parse::<T>() {
		Ok(v) => Some(v),
		Err(_) => {
			warn!(key, value = %value, "unparsable env override ignored");
			None
		}
	}
}

fn apply_env_overrides(cfg: &mut Config) {
	apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// `lookup` maps an env var name to its value.
fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
	let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

	if let Some(v) = non_empty("LIVEROOM_DATABASE_URL") {
		cfg.database.url = v;
		info!("database config: url overridden by env");
	}

	if let Some(max) = parse_override::<u32>(&non_empty, "LIVEROOM_DATABASE_MAX_CONNECTIONS") {
		if max > 0 {
			cfg.database.max_connections = max;
			info!(max, "database config: max_connections overridden by env");
		} else {
			warn!("database config: max_connections must be positive; env override ignored");
		}
	}

	if let Some(max) = parse_override::<u32>(&non_empty, "LIVEROOM_MAXIMUM_LEARNER_STREAMINGS") {
		cfg.liveroom.maximum_learner_streamings = streamings_or_default(Some(max));
		info!(
			max = cfg.liveroom.maximum_learner_streamings,
			"liveroom config: maximum_learner_streamings overridden by env"
		);
	}

	if let Some(ms) = parse_override::<u64>(&non_empty, "LIVEROOM_COMMAND_TIMEOUT_MS") {
		cfg.liveroom.command_timeout = timeout_or_default(Some(ms));
		info!(ms, "liveroom config: command_timeout overridden by env");
	}

	if let Some(v) = non_empty("LIVEROOM_METRICS_BIND") {
		cfg.server.metrics_bind = Some(v);
		info!("server config: metrics_bind overridden by env");
	}

	if let Some(v) = non_empty("LIVEROOM_HEALTH_BIND") {
		cfg.server.health_bind = Some(v);
		info!("server config: health_bind overridden by env");
	}
}
