//! Access-token lifecycle with single-flight renewal and a 401 retry queue.
//!
//! [`TokenCoordinator`] owns the only in-memory copy of the access token. Outgoing calls pick
//! it up through [`TokenCoordinator::attach_to_outgoing_request`]; a `401` coming back enters
//! [`TokenCoordinator::handle_auth_failure`], which starts (or joins) one recovery per expiry
//! wave. A recovery runs the shared [`TokenCoordinator::refresh_once`] renewal, then installs or
//! clears the token and releases its marker in one critical section before any parked request
//! resumes. Each request is retried at most once, and requests aimed at the refresh endpoint
//! never recover.
//!
//! Renewals and recoveries are [`Shared`] futures stored in the coordinator state. Whichever
//! waiter is still polling drives the work, so dropping one caller (including the request that
//! started the recovery) never strands the others.

mod metrics;
mod state;

pub use metrics::RenewalMetrics;

// crates.io
use futures_util::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::{ClientConfig, RenewalFailurePolicy},
	error::RenewalError,
	http::{self, ApiRequest, ApiResponse, ApiTransport, StatusCode},
	obs::{self, AuthOutcome, AuthSpan, AuthStage},
};
use state::{CoordinatorState, RecoveryState, RenewalState};

/// Result shared by every caller waiting on one renewal: a fresh token, "no session", or the
/// failure every waiter receives.
pub type RenewalOutcome = Result<Option<AccessToken>, Arc<Error>>;

pub(crate) type SharedOutcome = Shared<BoxFuture<'static, RenewalOutcome>>;

type TokenListener = Arc<dyn Fn(Option<&AccessToken>) + Send + Sync>;

/// One consumer call travelling through the coordinator.
#[derive(Clone, Debug)]
pub struct AuthenticatedRequest {
	request: ApiRequest,
	retried: bool,
}
impl AuthenticatedRequest {
	/// Wraps a request that has not been retried yet.
	pub fn new(request: ApiRequest) -> Self {
		Self { request, retried: false }
	}

	/// Target operation.
	pub fn request(&self) -> &ApiRequest {
		&self.request
	}

	/// Whether the automatic credential-expiry retry has already been spent.
	pub fn retried(&self) -> bool {
		self.retried
	}

	/// Unwraps the target operation.
	pub fn into_request(self) -> ApiRequest {
		self.request
	}
}

struct Core<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	refresh_path: String,
	refresh_route: String,
	policy: RenewalFailurePolicy,
	metrics: RenewalMetrics,
	listeners: Mutex<Vec<TokenListener>>,
}
impl<T> Core<T>
where
	T: ?Sized + ApiTransport,
{
	fn notify(&self, token: Option<&AccessToken>) {
		// Snapshot so listeners may change the token or register listeners themselves.
		let listeners = self.listeners.lock().clone();

		for listener in listeners {
			listener(token);
		}
	}

	async fn renew(&self) -> RenewalOutcome {
		const STAGE: AuthStage = AuthStage::Renewal;

		let span = AuthSpan::new(STAGE, "refresh_once");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);
		self.metrics.record_started();

		let result = span.instrument(self.call_refresh_endpoint()).await;

		match &result {
			Ok(Some(_)) => {
				self.metrics.record_succeeded();
				obs::record_auth_outcome(STAGE, AuthOutcome::Success);
			},
			Ok(None) => {
				self.metrics.record_no_session();
				obs::record_auth_outcome(STAGE, AuthOutcome::NoSession);
			},
			Err(_) => {
				self.metrics.record_failed();
				obs::record_auth_outcome(STAGE, AuthOutcome::Failure);
			},
		}

		result.map_err(Arc::new)
	}

	async fn call_refresh_endpoint(&self) -> Result<Option<AccessToken>> {
		let response = self.transport.send(ApiRequest::post(self.refresh_path.as_str())).await?;

		match response.status {
			// No renewal cookie, or an expired/revoked one: a normal signed-out outcome.
			StatusCode::NO_CONTENT | StatusCode::UNAUTHORIZED => Ok(None),
			status if status.is_success() => {
				let body: RenewalBody = http::decode_json(&response.body)
					.map_err(|source| RenewalError::ResponseParse { source })?;

				Ok(body.access_token.filter(|token| !token.is_empty()).map(AccessToken::from))
			},
			status => Err(RenewalError::UnexpectedStatus { status: status.as_u16() }.into()),
		}
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewalBody {
	access_token: Option<String>,
}

/// Process-wide owner of the access token and its renewal pipeline.
///
/// Cloning is cheap and every clone shares the same state, so one coordinator can be handed to
/// the session layer and to every consumer. Fresh instances never share anything, which keeps
/// tests isolated.
pub struct TokenCoordinator<T>
where
	T: ?Sized + ApiTransport,
{
	core: Arc<Core<T>>,
	state: Arc<Mutex<CoordinatorState>>,
}
impl<T> TokenCoordinator<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a coordinator with no token over the provided transport.
	pub fn new(config: &ClientConfig, transport: impl Into<Arc<T>>) -> Self {
		let refresh = ApiRequest::post(config.endpoints.refresh.as_str());
		let core = Core {
			transport: transport.into(),
			refresh_route: refresh.route().to_owned(),
			refresh_path: refresh.path,
			policy: config.renewal_failure_policy,
			metrics: RenewalMetrics::default(),
			listeners: Default::default(),
		};

		Self { core: Arc::new(core), state: Default::default() }
	}

	/// Transport shared by every call issued through this coordinator.
	pub fn transport(&self) -> &Arc<T> {
		&self.core.transport
	}

	/// Renewal and retry counters.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.core.metrics
	}

	/// Registers a callback fired after every change of the held token.
	///
	/// Callbacks run synchronously on the task that changed the token, without any coordinator
	/// lock held. A callback registered from inside another one fires from the next change on.
	pub fn on_token_change(
		&self,
		listener: impl Fn(Option<&AccessToken>) + 'static + Send + Sync,
	) {
		self.core.listeners.lock().push(Arc::new(listener));
	}

	/// Returns a copy of the held token.
	pub fn access_token(&self) -> Option<AccessToken> {
		self.state.lock().access_token.clone()
	}

	/// Returns `true` while a token is held.
	pub fn has_access_token(&self) -> bool {
		self.state.lock().access_token.is_some()
	}

	/// Returns `true` while a renewal or a recovery is outstanding.
	pub fn is_renewing(&self) -> bool {
		self.state.lock().is_busy()
	}

	/// Number of requests parked on the outstanding recovery.
	pub fn queued_requests(&self) -> usize {
		self.state.lock().queued()
	}

	/// Replaces the held token. `None` signs the client out locally.
	pub fn set_access_token(&self, token: Option<AccessToken>) {
		let change = self.state.lock().replace_token(token);

		if let Some(token) = change {
			self.core.notify(token.as_ref());
		}
	}

	/// Adds the bearer credential to `request` when a token is held.
	pub fn attach_to_outgoing_request(&self, request: &mut ApiRequest) {
		if let Some(token) = self.access_token() {
			request.set_bearer(&token);
		}
	}

	/// Calls the refresh endpoint, or joins the call already in flight.
	///
	/// Resolves to `Some(token)` on renewal, `None` when there is no active session (including a
	/// `401` from the refresh endpoint), and [`Error::Renewal`] for anything else. The token is
	/// not installed; callers decide what to do with it.
	pub async fn refresh_once(&self) -> Result<Option<AccessToken>> {
		let outcome = {
			let mut state = self.state.lock();

			self.renewal_handle(&mut state)
		};

		outcome.await.map_err(Error::Renewal)
	}

	/// Recovers from a `401` on `call`.
	///
	/// Requests to the refresh endpoint and requests that were already retried fail with
	/// `error`. Otherwise the request is marked retried and joins the outstanding recovery (or
	/// starts one). On renewal it is re-issued with the new token and its result returned; on
	/// "no session" it fails with `error`; on renewal failure it fails with [`Error::Renewal`].
	pub async fn handle_auth_failure(
		&self,
		call: &mut AuthenticatedRequest,
		error: Error,
	) -> Result<ApiResponse> {
		if self.is_refresh_request(&call.request) || call.retried {
			return Err(error);
		}

		call.retried = true;
		self.core.metrics.record_retry();

		let outcome = self.join_recovery();

		match outcome.await {
			Ok(Some(token)) => {
				call.request.set_bearer(&token);

				self.reissue(call).await
			},
			Ok(None) => Err(error),
			Err(cause) => Err(Error::Renewal(cause)),
		}
	}

	/// Sends an authenticated request, recovering transparently from one credential expiry.
	///
	/// Non-`401` statuses are returned untouched; use [`ApiResponse::error_for_status`] to turn
	/// them into errors.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut call = AuthenticatedRequest::new(request);
		let response = self.dispatch(&mut call.request).await?;

		if !response.is_auth_failure() {
			return Ok(response);
		}

		let error = Error::Unauthorized { path: call.request.path.clone() };

		self.handle_auth_failure(&mut call, error).await
	}

	/// Sends a request without credentials and without recovery (login, public endpoints).
	pub async fn send_public(&self, request: ApiRequest) -> Result<ApiResponse> {
		Ok(self.core.transport.send(request).await?)
	}

	fn is_refresh_request(&self, request: &ApiRequest) -> bool {
		request.route() == self.core.refresh_route
	}

	async fn dispatch(&self, request: &mut ApiRequest) -> Result<ApiResponse> {
		self.attach_to_outgoing_request(request);

		Ok(self.core.transport.send(request.clone()).await?)
	}

	async fn reissue(&self, call: &mut AuthenticatedRequest) -> Result<ApiResponse> {
		let response = self.dispatch(&mut call.request).await?;

		// The retry budget is spent; a second rejection is terminal.
		if response.is_auth_failure() {
			return Err(Error::Unauthorized { path: call.request.path.clone() });
		}

		Ok(response)
	}

	fn renewal_handle(&self, state: &mut CoordinatorState) -> SharedOutcome {
		if let RenewalState::InFlight { outcome, .. } = &state.renewal {
			return outcome.clone();
		}

		let id = state.next_id();
		let core = Arc::clone(&self.core);
		let weak = Arc::downgrade(&self.state);
		let outcome = async move {
			let result = core.renew().await;

			if let Some(state) = weak.upgrade() {
				state.lock().finish_renewal(id);
			}

			result
		}
		.boxed()
		.shared();

		state.renewal = RenewalState::InFlight { id, outcome: outcome.clone() };

		outcome
	}

	fn join_recovery(&self) -> SharedOutcome {
		const STAGE: AuthStage = AuthStage::Recovery;

		let mut state = self.state.lock();

		if let RecoveryState::Recovering { outcome, queued, .. } = &mut state.recovery {
			*queued += 1;
			self.core.metrics.record_queued();

			return outcome.clone();
		}

		let id = state.next_id();
		let renewal = self.renewal_handle(&mut state);
		let core = Arc::clone(&self.core);
		let weak = Arc::downgrade(&self.state);
		let span = AuthSpan::new(STAGE, "handle_auth_failure");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let result = renewal.await;

				if let Some(state) = weak.upgrade() {
					let change = state.lock().complete_recovery(id, &result, core.policy);

					if let Some(token) = change {
						core.notify(token.as_ref());
					}
				}

				match &result {
					Ok(Some(_)) => obs::record_auth_outcome(STAGE, AuthOutcome::Success),
					Ok(None) => obs::record_auth_outcome(STAGE, AuthOutcome::NoSession),
					Err(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Failure),
				}

				result
			})
			.boxed()
			.shared();

		state.recovery = RecoveryState::Recovering { id, outcome: outcome.clone(), queued: 0 };

		outcome
	}
}
impl<T> Clone for TokenCoordinator<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self { core: Arc::clone(&self.core), state: Arc::clone(&self.state) }
	}
}
impl<T> Debug for TokenCoordinator<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("TokenCoordinator")
			.field("refresh_path", &self.core.refresh_path)
			.field("token_held", &state.access_token.is_some())
			.field("renewing", &state.is_busy())
			.field("queued", &state.queued())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{error::TransportError, http::TransportFuture};

	struct StaticTransport {
		reply: fn(&ApiRequest) -> ApiResponse,
		calls: AtomicUsize,
	}
	impl ApiTransport for StaticTransport {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let reply = (self.reply)(&request);

			Box::pin(async move { Ok::<_, TransportError>(reply) })
		}
	}

	fn coordinator(reply: fn(&ApiRequest) -> ApiResponse) -> TokenCoordinator<StaticTransport> {
		let config = ClientConfig::builder(
			Url::parse("http://localhost:8081").expect("Base URL fixture should parse."),
		)
		.build()
		.expect("Default config should validate.");

		TokenCoordinator::new(&config, StaticTransport { reply, calls: AtomicUsize::new(0) })
	}

	#[test]
	fn attach_only_adds_header_when_token_is_held() {
		let coordinator = coordinator(|_| ApiResponse::new(StatusCode::OK));
		let mut request = ApiRequest::get("/api/tasks");

		coordinator.attach_to_outgoing_request(&mut request);

		assert_eq!(request.authorization(), None);

		coordinator.set_access_token(Some("t1".into()));
		coordinator.attach_to_outgoing_request(&mut request);

		assert_eq!(request.authorization(), Some("Bearer t1"));
	}

	#[test]
	fn clearing_twice_is_a_no_op() {
		let coordinator = coordinator(|_| ApiResponse::new(StatusCode::OK));
		let changes = Arc::new(AtomicUsize::new(0));
		let seen = Arc::clone(&changes);

		coordinator.on_token_change(move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		});
		coordinator.set_access_token(None);
		coordinator.set_access_token(None);

		assert_eq!(changes.load(Ordering::SeqCst), 0);
		assert!(!coordinator.has_access_token());
		assert!(!coordinator.is_renewing());
		assert_eq!(coordinator.metrics().renewals_started(), 0);
		assert_eq!(coordinator.transport().calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn listeners_may_change_the_token_themselves() {
		let coordinator = coordinator(|_| ApiResponse::new(StatusCode::OK));
		let inner = coordinator.clone();
		let changes = Arc::new(AtomicUsize::new(0));
		let seen = Arc::clone(&changes);

		coordinator.on_token_change(move |token| {
			seen.fetch_add(1, Ordering::SeqCst);

			if token == Some(&AccessToken::from("stale")) {
				inner.set_access_token(Some("replacement".into()));
				inner.on_token_change(|_| {});
			}
		});
		coordinator.set_access_token(Some("stale".into()));

		assert_eq!(coordinator.access_token(), Some("replacement".into()));
		assert_eq!(changes.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn refresh_endpoint_statuses_map_to_outcomes() {
		let renewed = coordinator(|_| {
			ApiResponse::json_body(StatusCode::OK, &serde_json::json!({ "accessToken": "t2" }))
		});

		assert_eq!(renewed.refresh_once().await.expect("200 should renew."), Some("t2".into()));
		// Renewal alone never installs the token.
		assert!(!renewed.has_access_token());

		let signed_out = coordinator(|_| ApiResponse::new(StatusCode::NO_CONTENT));

		assert_eq!(signed_out.refresh_once().await.expect("204 is not an error."), None);

		let revoked = coordinator(|_| ApiResponse::new(StatusCode::UNAUTHORIZED));

		assert_eq!(revoked.refresh_once().await.expect("401 is not an error."), None);

		let empty = coordinator(|_| ApiResponse::json_body(StatusCode::OK, &serde_json::json!({})));

		assert_eq!(empty.refresh_once().await.expect("Missing tokens mean no session."), None);

		let broken = coordinator(|_| ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR));
		let err = broken.refresh_once().await.expect_err("500 should surface.");

		assert!(matches!(
			err.renewal_cause(),
			Some(Error::RenewalResponse(RenewalError::UnexpectedStatus { status: 500 }))
		));
		assert!(!broken.is_renewing());
		assert_eq!(broken.metrics().renewals_failed(), 1);
	}

	#[tokio::test]
	async fn refresh_endpoint_failures_never_recover() {
		let coordinator = coordinator(|_| ApiResponse::new(StatusCode::UNAUTHORIZED));
		let mut call = AuthenticatedRequest::new(ApiRequest::post("/api/refresh"));
		let err = coordinator
			.handle_auth_failure(&mut call, Error::Unauthorized { path: "/api/refresh".into() })
			.await
			.expect_err("Refresh endpoint failures should propagate.");

		assert!(err.is_unauthorized());
		assert!(!call.retried());
		assert_eq!(coordinator.metrics().renewals_started(), 0);
		assert_eq!(coordinator.transport().calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn retried_requests_fail_without_renewal() {
		let coordinator = coordinator(|_| ApiResponse::new(StatusCode::UNAUTHORIZED));
		let mut call = AuthenticatedRequest::new(ApiRequest::get("/api/tasks"));

		call.retried = true;

		let err = coordinator
			.handle_auth_failure(&mut call, Error::Unauthorized { path: "/api/tasks".into() })
			.await
			.expect_err("Second failures should propagate.");

		assert!(err.is_unauthorized());
		assert_eq!(coordinator.metrics().renewals_started(), 0);
	}
}
