#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use liveroom_server::config::{self, Config};
use liveroom_server::health::{HealthState, spawn_health_server};
use liveroom_server::{Dispatcher, LiveRoomService, LocalWhiteboard, Repositories};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: liveroom_server [--config PATH]\n\
\n\
Options:\n\
\t--config   Config file (default: ~/.liveroom/config.toml)\n\
\t--help     Show this help\n\
"
	);
	std::process::exit(2)
}

fn parse_args() -> Option<PathBuf> {
	let mut config_path = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--config must be non-empty");
					usage_and_exit();
				}
				config_path = Some(PathBuf::from(v));
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	config_path
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,liveroom_server=debug".to_string());

	let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
		.ok()
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty());
	let base = tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false));

	if let Some(endpoint) = otlp_endpoint {
		use opentelemetry::global;
		use opentelemetry::trace::TracerProvider as _;
		use opentelemetry_otlp::WithExportConfig;

		match opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.with_endpoint(endpoint.clone())
			.build()
		{
			Ok(exporter) => {
				let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
					.with_batch_exporter(exporter)
					.build();
				let tracer = tracer_provider.tracer("liveroom_server");
				global::set_tracer_provider(tracer_provider);

				base.with(tracing_opentelemetry::layer().with_tracer(tracer)).init();
				info!(endpoint = %endpoint, "otlp tracing enabled");
			}
			Err(e) => {
				base.init();
				warn!(error = %e, "failed to initialize otlp tracing");
			}
		}
	} else {
		base.init();
	}
}

fn init_metrics(bind: Option<&str>) {
	let Some(bind) = bind else {
		return;
	};

	match bind.parse::<std::net::SocketAddr>() {
		Ok(addr) => {
			if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
				.with_http_listener(addr)
				.install()
			{
				warn!(error = %e, "failed to start metrics exporter");
			} else {
				info!(%addr, "metrics exporter listening");
			}
		}
		Err(e) => {
			warn!(error = %e, %bind, "invalid metrics bind address (expected host:port)");
		}
	}
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
	let path = match path {
		Some(path) => path,
		None => config::default_config_path()?,
	};
	let cfg = config::load_config_from_path(&path)?;
	info!(path = %path.display(), "loaded config (toml + env overrides)");
	Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config_path = parse_args();
	init_tracing();

	let cfg = load_config(config_path)?;
	init_metrics(cfg.server.metrics_bind.as_deref());

	let pool = liveroom_store::connect(&cfg.database.settings())
		.await
		.with_context(|| format!("open database {}", cfg.database.url))?;

	let health_state = HealthState::new(Some(pool.clone()));
	if let Some(bind) = cfg.server.health_bind.as_deref() {
		match bind.parse::<std::net::SocketAddr>() {
			Ok(addr) => {
				spawn_health_server(addr, health_state.clone());
				info!(%addr, "health server listening");
			}
			Err(e) => warn!(error = %e, %bind, "invalid health bind address (expected host:port)"),
		}
	}

	let dispatcher = Arc::new(Dispatcher::new(
		pool.clone(),
		Repositories::sqlite(),
		cfg.liveroom.command_timeout,
	));
	let service = LiveRoomService::new(
		dispatcher,
		Arc::new(LocalWhiteboard::new()),
		cfg.liveroom.maximum_learner_streamings,
	);

	health_state.mark_ready();
	info!(
		maximum_learner_streamings = service.maximum_learner_streamings(),
		command_timeout = ?service.dispatcher().command_timeout(),
		"liveroom_server ready"
	);

	tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
	info!("shutting down");
	health_state.mark_not_ready();
	drop(service);
	pool.close().await;
	Ok(())
}
