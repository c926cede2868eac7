// self
use crate::{
	_prelude::*,
	config::{ClientConfig, EndpointPaths, RenewalFailurePolicy},
	error::ConfigError,
};

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// API origin.
	pub base_url: Url,
	/// Auth endpoint paths.
	pub endpoints: EndpointPaths,
	/// Routes that skip session restoration.
	pub public_routes: Vec<String>,
	/// Token handling when a renewal fails on the network.
	pub renewal_failure_policy: RenewalFailurePolicy,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the default endpoint layout.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: EndpointPaths::default(),
			public_routes: vec!["/login".into(), "/signup".into()],
			renewal_failure_policy: RenewalFailurePolicy::default(),
		}
	}

	/// Parses `raw` into the base URL.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		let base_url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(Self::new(base_url))
	}

	/// Overrides the renewal endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the login endpoint path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Overrides the logout endpoint path.
	pub fn logout_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.logout = path.into();

		self
	}

	/// Replaces the public route list.
	pub fn public_routes<I, S>(mut self, routes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.public_routes = routes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the renewal failure policy.
	pub fn renewal_failure_policy(mut self, policy: RenewalFailurePolicy) -> Self {
		self.renewal_failure_policy = policy;

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			base_url: self.base_url,
			endpoints: self.endpoints,
			public_routes: self.public_routes,
			renewal_failure_policy: self.renewal_failure_policy,
		};

		config.validate()?;

		Ok(config)
	}
}
