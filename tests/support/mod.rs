//! Shared fixtures for integration tests: a scripted in-process API server and helpers.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
// self
#[cfg(feature = "reqwest")] use session_broker::{http::ReqwestTransport, reqwest::Client};
use session_broker::{
	config::ClientConfig,
	coordinator::TokenCoordinator,
	error::TransportError,
	http::{
		ApiRequest, ApiResponse, ApiTransport, Method, RequestBody, StatusCode, TransportFuture,
	},
	session::SessionClient,
	url::Url,
};

pub const REFRESH_PATH: &str = "/api/refresh";
pub const LOGIN_PATH: &str = "/api/login";
pub const LOGOUT_PATH: &str = "/api/logout";

/// Scripted reply of the refresh endpoint.
#[derive(Clone, Debug)]
pub enum Renewal {
	/// `200 {"accessToken": ..}`; the server starts accepting this token.
	Token(String),
	/// `204`, no renewal cookie.
	NoSession,
	/// `401`, renewal cookie expired or revoked.
	Revoked,
	/// Any other status.
	Status(u16),
	/// Connection failure.
	Network,
}

/// One request as the server observed it.
#[derive(Clone, Debug)]
pub struct Seen {
	pub method: Method,
	pub path: String,
	pub authorization: Option<String>,
	pub body: Option<RequestBody>,
}

/// In-process stand-in for the task API.
///
/// Protected paths answer `200` only for the currently accepted bearer token and `401`
/// otherwise. Refresh replies are scripted and, when gated, park until released.
pub struct ScriptedTransport {
	accepted: Mutex<Option<String>>,
	renewals: Mutex<VecDeque<Renewal>>,
	login_token: Mutex<Option<String>>,
	logout_status: Mutex<StatusCode>,
	rejecting: Mutex<bool>,
	replies: Mutex<HashMap<String, serde_json::Value>>,
	gate: Option<Semaphore>,
	refresh_calls: AtomicUsize,
	seen: Mutex<Vec<Seen>>,
}
impl ScriptedTransport {
	/// Refresh replies resolve immediately.
	pub fn new() -> Self {
		Self::build(None)
	}

	/// Refresh replies wait for [`ScriptedTransport::release_renewals`].
	pub fn gated() -> Self {
		Self::build(Some(Semaphore::new(0)))
	}

	fn build(gate: Option<Semaphore>) -> Self {
		Self {
			accepted: Mutex::new(None),
			renewals: Mutex::new(VecDeque::new()),
			login_token: Mutex::new(None),
			logout_status: Mutex::new(StatusCode::NO_CONTENT),
			rejecting: Mutex::new(false),
			replies: Mutex::new(HashMap::new()),
			gate,
			refresh_calls: AtomicUsize::new(0),
			seen: Mutex::new(Vec::new()),
		}
	}

	/// Sets the token protected paths accept.
	pub fn accept(self, token: &str) -> Self {
		*self.accepted.lock() = Some(token.to_owned());

		self
	}

	/// Queues the next refresh reply. An empty script answers "no session".
	pub fn renewal(self, renewal: Renewal) -> Self {
		self.renewals.lock().push_back(renewal);

		self
	}

	/// Token handed out by the login endpoint; unset means wrong credentials.
	pub fn login_issues(self, token: &str) -> Self {
		*self.login_token.lock() = Some(token.to_owned());

		self
	}

	/// Status returned by the logout endpoint.
	pub fn logout_status(self, status: StatusCode) -> Self {
		*self.logout_status.lock() = status;

		self
	}

	/// Protected paths answer `401` whatever the token.
	pub fn rejecting(self) -> Self {
		*self.rejecting.lock() = true;

		self
	}

	/// JSON body an authorized call to `path` answers with, instead of the default echo.
	pub fn replying(self, path: &str, body: serde_json::Value) -> Self {
		self.replies.lock().insert(path.to_owned(), body);

		self
	}

	/// Lets `n` parked refresh replies through.
	pub fn release_renewals(&self, n: usize) {
		if let Some(gate) = &self.gate {
			gate.add_permits(n);
		}
	}

	pub fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}

	/// Authorization headers of every call to `path`, in arrival order.
	pub fn authorizations(&self, path: &str) -> Vec<Option<String>> {
		self.seen
			.lock()
			.iter()
			.filter(|seen| seen.path == path)
			.map(|seen| seen.authorization.clone())
			.collect()
	}

	async fn refresh(&self) -> Result<ApiResponse, TransportError> {
		self.refresh_calls.fetch_add(1, Ordering::SeqCst);

		if let Some(gate) = &self.gate {
			gate.acquire().await.expect("Renewal gate should stay open.").forget();
		}

		let renewal = self.renewals.lock().pop_front().unwrap_or(Renewal::NoSession);

		match renewal {
			Renewal::Token(token) => {
				*self.accepted.lock() = Some(token.clone());

				Ok(ApiResponse::json_body(
					StatusCode::OK,
					&serde_json::json!({ "accessToken": token }),
				))
			},
			Renewal::NoSession => Ok(ApiResponse::new(StatusCode::NO_CONTENT)),
			Renewal::Revoked => Ok(ApiResponse::new(StatusCode::UNAUTHORIZED)),
			Renewal::Status(status) => Ok(ApiResponse::new(
				StatusCode::from_u16(status).expect("Scripted status should be valid."),
			)),
			Renewal::Network => Err(TransportError::network(
				REFRESH_PATH,
				std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "server unreachable"),
			)),
		}
	}

	fn login(&self) -> ApiResponse {
		match self.login_token.lock().clone() {
			Some(token) => {
				*self.accepted.lock() = Some(token.clone());

				ApiResponse::json_body(StatusCode::OK, &serde_json::json!({ "accessToken": token }))
			},
			None => ApiResponse::json_body(
				StatusCode::UNAUTHORIZED,
				&serde_json::json!({ "error": "BAD_CREDENTIALS", "message": "wrong password" }),
			),
		}
	}

	fn protected(&self, path: &str, authorization: Option<&str>) -> ApiResponse {
		let accepted = self.accepted.lock().clone().filter(|_| !*self.rejecting.lock());

		match (accepted, authorization) {
			(Some(token), Some(header)) if header == format!("Bearer {token}") => {
				if path == LOGOUT_PATH {
					*self.accepted.lock() = None;

					return ApiResponse::new(*self.logout_status.lock());
				}

				let body = self.replies.lock().get(path).cloned();

				ApiResponse::json_body(
					StatusCode::OK,
					&body.unwrap_or_else(|| serde_json::json!({ "path": path, "token": token })),
				)
			},
			_ => ApiResponse::new(StatusCode::UNAUTHORIZED),
		}
	}
}
impl Default for ScriptedTransport {
	fn default() -> Self {
		Self::new()
	}
}
impl ApiTransport for ScriptedTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let authorization = request.authorization().map(str::to_owned);
			let path = request.route().to_owned();

			self.seen.lock().push(Seen {
				method: request.method.clone(),
				path: path.clone(),
				authorization: authorization.clone(),
				body: request.body.clone(),
			});

			match path.as_str() {
				REFRESH_PATH => self.refresh().await,
				LOGIN_PATH => Ok(self.login()),
				_ => Ok(self.protected(&path, authorization.as_deref())),
			}
		})
	}
}

pub fn test_config() -> ClientConfig {
	let base_url = Url::parse("http://localhost:8081").expect("Base URL fixture should parse.");

	ClientConfig::builder(base_url).build().expect("Default test config should validate.")
}

pub fn coordinator(transport: ScriptedTransport) -> TokenCoordinator<ScriptedTransport> {
	TokenCoordinator::new(&test_config(), transport)
}

pub fn session(transport: ScriptedTransport) -> SessionClient<ScriptedTransport> {
	SessionClient::new(test_config(), coordinator(transport))
}

/// Cookie-enabled reqwest transport that trusts the self-signed certificates `httpmock` serves.
#[cfg(feature = "reqwest")]
pub fn mock_server_transport(base_url: Url) -> ReqwestTransport {
	let client = Client::builder()
		.cookie_store(true)
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestTransport::with_client(client, base_url)
}

/// Unsigned JWT carrying `claims`, shaped like the server's access tokens.
pub fn jwt(claims: serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{payload}.signature")
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
	tokio::time::timeout(StdDuration::from_secs(5), async {
		while !condition() {
			tokio::time::sleep(StdDuration::from_millis(2)).await;
		}
	})
	.await
	.expect("Condition should hold before the timeout.");
}
