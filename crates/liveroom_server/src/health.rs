#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tracing::warn;

/// Readiness flag plus the pool `/readyz` pings.
#[derive(Clone)]
pub struct HealthState {
	ready: Arc<AtomicBool>,
	pool: Option<SqlitePool>,
}

impl HealthState {
	pub fn new(pool: Option<SqlitePool>) -> Self {
		Self {
			ready: Arc::new(AtomicBool::new(false)),
			pool,
		}
	}

	pub fn mark_ready(&self) {
		self.ready.store(true, Ordering::Relaxed);
	}

	pub fn mark_not_ready(&self) {
		self.ready.store(false, Ordering::Relaxed);
	}

	/// Ready once marked and the database answers.
	pub async fn is_ready(&self) -> bool {
		if !self.ready.load(Ordering::Relaxed) {
			return false;
		}
		match &self.pool {
			Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
				Ok(_) => true,
				Err(e) => {
					warn!(error = %e, "readiness database ping failed");
					false
				}
			},
			None => true,
		}
	}
}

pub fn spawn_health_server(bind: SocketAddr, state: HealthState) {
	tokio::spawn(async move {
		if let Err(err) = run_health_server(bind, state).await {
			warn!(error = %err, "health server stopped");
		}
	});
}

async fn run_health_server(bind: SocketAddr, state: HealthState) -> anyhow::Result<()> {
	let listener = TcpListener::bind(bind).await?;
	loop {
		let (stream, _addr) = listener.accept().await?;
		let io = TokioIo::new(stream);
		let state = state.clone();
		tokio::spawn(async move {
			let service = service_fn(move |req| handle_health(req, state.clone()));
			if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
				warn!(error = %err, "health connection error");
			}
		});
	}
}

fn respond(status: StatusCode, body: &'static [u8]) -> Response<Full<Bytes>> {
	let mut response = Response::new(Full::new(Bytes::from_static(body)));
	*response.status_mut() = status;
	response
}

async fn handle_health(req: Request<Incoming>, state: HealthState) -> Result<Response<Full<Bytes>>, hyper::Error> {
	if req.method() != Method::GET {
		return Ok(respond(StatusCode::METHOD_NOT_ALLOWED, b""));
	}

	Ok(match req.uri().path() {
		"/healthz" => respond(StatusCode::OK, b"ok"),
		"/readyz" if state.is_ready().await => respond(StatusCode::OK, b"ready"),
		"/readyz" => respond(StatusCode::SERVICE_UNAVAILABLE, b"not-ready"),
		_ => respond(StatusCode::NOT_FOUND, b""),
	})
}
