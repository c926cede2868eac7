//! Client configuration: API base URL, auth endpoint layout, and renewal policy.
//!
//! Values are validated once, either by [`ClientConfigBuilder::build`] or by
//! [`ClientConfig::from_json_str`], so the coordinator and session layer can rely on absolute
//! paths and an http(s) base URL.

/// Builder API for assembling client configuration.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError, http};

/// What happens to the held token when a renewal fails.
///
/// Applies to 401 recovery and to the startup restore alike. "No session" replies always clear
/// the token, and so does any failure under [`RenewalFailurePolicy::ClearToken`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenewalFailurePolicy {
	/// Clear the held token so observers fall back to the signed-out state.
	#[default]
	ClearToken,
	/// Keep the held token when the renewal never reached a verdict (network failure).
	PreserveToken,
}
impl RenewalFailurePolicy {
	/// Returns `true` when a renewal failing with `cause` leaves the held token in place.
	pub fn keeps_token(self, cause: &Error) -> bool {
		self == Self::PreserveToken && cause.is_transport()
	}
}

/// Auth endpoint paths relative to the API base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointPaths {
	/// Renewal endpoint exchanging the renewal cookie for an access token.
	pub refresh: String,
	/// Login endpoint issuing the first access token.
	pub login: String,
	/// Logout endpoint invalidating the renewal cookie.
	pub logout: String,
}
impl Default for EndpointPaths {
	fn default() -> Self {
		Self {
			refresh: "/api/refresh".into(),
			login: "/api/login".into(),
			logout: "/api/logout".into(),
		}
	}
}

/// Validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	/// API origin every request path is resolved against.
	pub base_url: Url,
	/// Auth endpoint paths.
	#[serde(default)]
	pub endpoints: EndpointPaths,
	/// Routes that never restore a session on startup.
	#[serde(default = "default_public_routes")]
	pub public_routes: Vec<String>,
	/// Token handling when a renewal fails on the network.
	#[serde(default)]
	pub renewal_failure_policy: RenewalFailurePolicy,
}
impl ClientConfig {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let config: Self = http::decode_json(raw.as_bytes())
			.map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Returns `true` when `route` is listed as public.
	pub fn is_public_route(&self, route: &str) -> bool {
		let route = normalize_route(route);

		self.public_routes.iter().any(|public| normalize_route(public) == route)
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		match self.base_url.scheme() {
			"http" | "https" => {},
			scheme => return Err(ConfigError::UnsupportedScheme { scheme: scheme.to_owned() }),
		}

		ensure_absolute("refresh", &self.endpoints.refresh)?;
		ensure_absolute("login", &self.endpoints.login)?;
		ensure_absolute("logout", &self.endpoints.logout)?;

		for route in &self.public_routes {
			ensure_absolute("public route", route)?;
		}

		Ok(())
	}
}

fn default_public_routes() -> Vec<String> {
	vec!["/login".into(), "/signup".into()]
}

fn ensure_absolute(endpoint: &'static str, path: &str) -> Result<(), ConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(ConfigError::RelativePath { endpoint, path: path.to_owned() })
	}
}

fn normalize_route(route: &str) -> &str {
	let route = route.split(['?', '#']).next().unwrap_or_default();

	match route.trim_end_matches('/') {
		"" => "/",
		trimmed => trimmed,
	}
}
