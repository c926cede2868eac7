//! Session collaborators layered over the [`TokenCoordinator`]: login, logout, and the one-shot
//! bootstrap that restores a session from the renewal cookie when the client starts.

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SessionUser},
	config::ClientConfig,
	coordinator::TokenCoordinator,
	http::{ApiRequest, ApiTransport},
	obs::{self, AuthOutcome, AuthSpan, AuthStage},
};

/// Email and password submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// How the startup renewal attempt settled.
#[derive(Clone, Debug)]
pub enum BootstrapOutcome {
	/// The client started on a public route, so no renewal was attempted.
	Skipped,
	/// The renewal cookie produced a token, which is now held.
	Restored(Option<SessionUser>),
	/// There was no session to restore.
	Anonymous,
	/// Renewal failed. Any held token was cleared unless the renewal failure policy kept it.
	Failed(Arc<Error>),
}

/// Authentication state observed by UI code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// Bootstrap has not settled yet; protected content must stay hidden.
	Pending,
	/// A token is held. The user is absent when the token carries no decodable claims.
	Authenticated(Option<SessionUser>),
	/// No token is held.
	Anonymous,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
	access_token: String,
}

/// Login, logout, and startup restoration for one coordinator.
pub struct SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	coordinator: TokenCoordinator<T>,
	config: Arc<ClientConfig>,
	bootstrap: Arc<OnceCell<BootstrapOutcome>>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a session client sharing `coordinator`'s token state.
	pub fn new(config: ClientConfig, coordinator: TokenCoordinator<T>) -> Self {
		Self { coordinator, config: Arc::new(config), bootstrap: Default::default() }
	}

	/// Coordinator every session call goes through.
	pub fn coordinator(&self) -> &TokenCoordinator<T> {
		&self.coordinator
	}

	/// Exchanges credentials for an access token and installs it.
	///
	/// The login call bypasses 401 recovery, so wrong credentials surface as
	/// [`Error::Unauthorized`] without touching the renewal pipeline.
	pub async fn login(&self, credentials: &Credentials) -> Result<Option<SessionUser>> {
		const STAGE: AuthStage = AuthStage::Login;

		let span = AuthSpan::new(STAGE, "login");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		let result = span.instrument(self.exchange_credentials(credentials)).await;

		match result {
			Ok(token) => {
				self.coordinator.set_access_token(Some(token.clone()));
				obs::record_auth_outcome(STAGE, AuthOutcome::Success);

				Ok(decode_user(&token))
			},
			Err(e) => {
				obs::record_auth_outcome(STAGE, AuthOutcome::Failure);

				Err(e)
			},
		}
	}

	/// Ends the session on the server and locally.
	///
	/// The token is cleared even when the server call fails; the server error is still returned
	/// so callers can report it.
	pub async fn logout(&self) -> Result<()> {
		const STAGE: AuthStage = AuthStage::Logout;

		let path = self.config.endpoints.logout.as_str();
		let span = AuthSpan::new(STAGE, "logout");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		let result = span
			.instrument(async {
				self.coordinator.send(ApiRequest::post(path)).await?.error_for_status(path)
			})
			.await;

		self.coordinator.set_access_token(None);

		match result {
			Ok(_) => {
				obs::record_auth_outcome(STAGE, AuthOutcome::Success);

				Ok(())
			},
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %e, "Server-side logout failed; local session cleared.");
				obs::record_auth_outcome(STAGE, AuthOutcome::Failure);

				Err(e)
			},
		}
	}

	/// Restores the session from the renewal cookie, once per client.
	///
	/// `route` is the location the client started on; public routes skip the renewal. Later calls
	/// (and concurrent ones) wait for and return the first outcome.
	pub async fn bootstrap(&self, route: &str) -> BootstrapOutcome {
		self.bootstrap.get_or_init(|| self.restore(route)).await.clone()
	}

	/// Waits until bootstrap has settled and returns the resulting state.
	pub async fn ready(&self) -> SessionState {
		self.bootstrap.wait().await;

		self.state()
	}

	/// Current state without waiting.
	///
	/// A held token always reads as authenticated. Without one the state stays
	/// [`SessionState::Pending`] until bootstrap settles.
	pub fn state(&self) -> SessionState {
		if let Some(token) = self.coordinator.access_token() {
			return SessionState::Authenticated(decode_user(&token));
		}
		if self.bootstrap.is_initialized() {
			SessionState::Anonymous
		} else {
			SessionState::Pending
		}
	}

	/// Decodes the user from the held token, if any.
	pub fn current_user(&self) -> Option<SessionUser> {
		self.coordinator.access_token().as_ref().and_then(decode_user)
	}

	async fn exchange_credentials(&self, credentials: &Credentials) -> Result<AccessToken> {
		let path = self.config.endpoints.login.as_str();
		let request = ApiRequest::post(path).json(credentials)?;
		let response = self.coordinator.send_public(request).await?.error_for_status(path)?;
		let body: LoginBody = response.json(path)?;

		Ok(AccessToken::from(body.access_token))
	}

	async fn restore(&self, route: &str) -> BootstrapOutcome {
		const STAGE: AuthStage = AuthStage::Bootstrap;

		if self.config.is_public_route(route) {
			#[cfg(feature = "tracing")]
			tracing::debug!(route, "Skipping session restore on a public route.");

			return BootstrapOutcome::Skipped;
		}

		let span = AuthSpan::new(STAGE, "bootstrap");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		match span.instrument(self.coordinator.refresh_once()).await {
			Ok(Some(token)) => {
				let user = decode_user(&token);

				self.coordinator.set_access_token(Some(token));
				obs::record_auth_outcome(STAGE, AuthOutcome::Success);

				BootstrapOutcome::Restored(user)
			},
			Ok(None) => {
				obs::record_auth_outcome(STAGE, AuthOutcome::NoSession);

				BootstrapOutcome::Anonymous
			},
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %e, "Session restore failed.");

				if !self.config.renewal_failure_policy.keeps_token(&e) {
					self.coordinator.set_access_token(None);
				}

				obs::record_auth_outcome(STAGE, AuthOutcome::Failure);

				BootstrapOutcome::Failed(Arc::new(e))
			},
		}
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			coordinator: self.coordinator.clone(),
			config: Arc::clone(&self.config),
			bootstrap: Arc::clone(&self.bootstrap),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("coordinator", &self.coordinator)
			.field("bootstrapped", &self.bootstrap.is_initialized())
			.finish()
	}
}

fn decode_user(token: &AccessToken) -> Option<SessionUser> {
	match SessionUser::from_token(token) {
		Ok(user) => Some(user),
		Err(e) => {
			#[cfg(feature = "tracing")]
			tracing::debug!(error = %e, "Access token carries no decodable user.");
			#[cfg(not(feature = "tracing"))]
			let _ = e;

			None
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credentials_debug_hides_password() {
		let rendered = format!("{:?}", Credentials::new("kim@example.com", "hunter2"));

		assert!(rendered.contains("kim@example.com"));
		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn credentials_serialize_as_login_body() {
		let body = serde_json::to_value(Credentials::new("kim@example.com", "hunter2"))
			.expect("Credentials should serialize.");

		assert_eq!(body, serde_json::json!({ "email": "kim@example.com", "password": "hunter2" }));
	}
}
