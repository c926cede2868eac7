//! Broker-level error types shared across the coordinator, session, and consumer layers.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Refresh endpoint answered with something other than a token or "no session".
	#[error(transparent)]
	RenewalResponse(#[from] RenewalError),
	/// Access token could not be decoded into a session user.
	#[error(transparent)]
	Claims(#[from] crate::auth::ClaimsError),

	/// Shared renewal failed; every caller waiting on that renewal receives the same cause.
	#[error("Access token renewal failed.")]
	Renewal(#[source] Arc<Error>),
	/// Server rejected the credential and no further automatic retry is allowed.
	#[error("Request to `{path}` was rejected as unauthorized.")]
	Unauthorized {
		/// Request path that was rejected.
		path: String,
	},
	/// Server answered with a non-success status outside the authorization path.
	#[error("Request to `{path}` failed with HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Request path that failed.
		path: String,
		/// Server-supplied `message` field, when the body carried one.
		message: Option<String>,
	},
	/// Response body did not match the expected JSON shape.
	#[error("Response from `{path}` could not be decoded.")]
	Decode {
		/// Request path whose response failed to decode.
		path: String,
		/// Structured parsing failure naming the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns `true` when the server rejected the credential for good.
	pub fn is_unauthorized(&self) -> bool {
		match self {
			Self::Unauthorized { .. } => true,
			Self::Renewal(cause) => cause.is_unauthorized(),
			_ => false,
		}
	}

	/// Returns the underlying cause of a shared renewal failure.
	pub fn renewal_cause(&self) -> Option<&Error> {
		match self {
			Self::Renewal(cause) => Some(cause.as_ref()),
			_ => None,
		}
	}

	/// Returns `true` when the failure came from the network rather than from a server reply.
	pub fn is_transport(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Renewal(cause) => cause.is_transport(),
			_ => false,
		}
	}
}

/// Configuration and validation failures raised while building clients.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http/https.
	#[error("Base URL must use http or https, got `{scheme}`.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Endpoint path is not absolute.
	#[error("The {endpoint} path `{path}` must start with `/`.")]
	RelativePath {
		/// Endpoint label.
		endpoint: &'static str,
		/// Offending path.
		path: String,
	},
	/// Request path could not be resolved against the base URL.
	#[error("Request path `{path}` cannot be joined to the base URL.")]
	InvalidRequestPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration document is malformed.
	#[error("Client configuration could not be parsed.")]
	Parse {
		/// Structured parsing failure naming the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[from] serde_json::Error),
	/// Header value contains characters HTTP does not allow.
	#[error("Header value is invalid.")]
	InvalidHeaderValue(#[from] ::http::header::InvalidHeaderValue),
	/// Upload declares a MIME type the transport cannot parse.
	#[error("Content type `{content_type}` is invalid.")]
	InvalidContentType {
		/// Offending MIME type.
		content_type: String,
		/// Transport-specific parsing failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Unexpected refresh endpoint replies.
#[derive(Debug, ThisError)]
pub enum RenewalError {
	/// Refresh endpoint returned a status outside `200`, `204`, and `401`.
	#[error("Refresh endpoint returned an unexpected status {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
	},
	/// Refresh endpoint responded with malformed JSON.
	#[error("Refresh endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{path}`.")]
	Network {
		/// Request path.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Request could not be turned into a transport request.
	#[error(transparent)]
	Request(#[from] ConfigError),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn renewal_wrapper_exposes_shared_cause() {
		let cause = Arc::new(Error::from(RenewalError::UnexpectedStatus { status: 503 }));
		let first = Error::Renewal(cause.clone());
		let second = Error::Renewal(cause);
		let source = StdError::source(&first)
			.expect("Renewal failures should expose the shared cause as their source.");

		assert_eq!(source.to_string(), "Refresh endpoint returned an unexpected status 503.");
		assert!(matches!(
			second.renewal_cause(),
			Some(Error::RenewalResponse(RenewalError::UnexpectedStatus { status: 503 }))
		));
	}

	#[test]
	fn classification_helpers_see_through_renewal_wrapper() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
		let transport = Error::Renewal(Arc::new(Error::from(TransportError::from(io))));
		let unauthorized = Error::Unauthorized { path: "/api/tasks".into() };

		assert!(transport.is_transport());
		assert!(!transport.is_unauthorized());
		assert!(unauthorized.is_unauthorized());
		assert_eq!(
			unauthorized.to_string(),
			"Request to `/api/tasks` was rejected as unauthorized."
		);
	}
}
