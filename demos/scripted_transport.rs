//! Plugs an in-memory [`ApiTransport`] into the coordinator and watches one expiry wave.
//!
//! 1. Implement [`ApiTransport`] for a type that owns whatever HTTP stack you use.
//! 2. Hand it to [`TokenCoordinator::new`]; the coordinator attaches the bearer token and
//!    recovers from `401` without the transport knowing.
//! 3. Fire several requests with an expired token and observe a single renewal.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use color_eyre::Result;
use parking_lot::Mutex;
use url::Url;
// self
use session_broker::{
	config::ClientConfig,
	coordinator::TokenCoordinator,
	error::TransportError,
	http::{ApiRequest, ApiResponse, ApiTransport, StatusCode, TransportFuture},
};

/// Accepts exactly one bearer token and rotates it on every refresh.
#[derive(Default)]
struct RotatingServer {
	current: Mutex<Option<String>>,
	refreshes: AtomicUsize,
}
impl ApiTransport for RotatingServer {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			if request.route() == "/api/refresh" {
				let generation = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
				let token = format!("access-{generation}");

				*self.current.lock() = Some(token.clone());

				return Ok::<_, TransportError>(ApiResponse::json_body(
					StatusCode::OK,
					&serde_json::json!({ "accessToken": token }),
				));
			}

			let expected = self.current.lock().as_ref().map(|token| format!("Bearer {token}"));

			if expected.is_some() && request.authorization() == expected.as_deref() {
				let body = serde_json::json!({ "path": request.path });

				Ok(ApiResponse::json_body(StatusCode::OK, &body))
			} else {
				Ok(ApiResponse::new(StatusCode::UNAUTHORIZED))
			}
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = ClientConfig::builder(Url::parse("https://tasks.example.com")?).build()?;
	let coordinator = TokenCoordinator::new(&config, RotatingServer::default());

	coordinator.on_token_change(|token| println!("Token changed: {token:?}."));
	coordinator.set_access_token(Some("expired-access".into()));

	let (first, second, third) = tokio::join!(
		coordinator.send(ApiRequest::get("/api/tasks/1")),
		coordinator.send(ApiRequest::get("/api/tasks/2")),
		coordinator.send(ApiRequest::get("/api/tasks/3")),
	);

	for response in [first?, second?, third?] {
		println!("{} answered {}.", String::from_utf8_lossy(&response.body), response.status);
	}

	println!(
		"Refresh calls: {}; queued requests: {}.",
		coordinator.transport().refreshes.load(Ordering::SeqCst),
		coordinator.metrics().queued()
	);

	Ok(())
}
