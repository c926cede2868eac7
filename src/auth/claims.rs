//! Session user view decoded from the access token payload.
//!
//! The payload is read without signature verification: the server validates every request, so
//! the client only needs the display fields (`sub`, `email`, `role`, `name`) and the expiry.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::AccessToken};

/// Errors raised while decoding token claims.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Token does not have the `header.payload.signature` shape.
	#[error("Access token is not a three-part JWT.")]
	Malformed,
	/// Payload segment is not valid base64url.
	#[error("Access token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// Payload JSON does not match the expected claims.
	#[error("Access token payload has unexpected claims.")]
	Payload(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// `exp` claim is outside the representable range.
	#[error("Access token expiry is out of range.")]
	ExpiryOutOfRange(#[from] time::error::ComponentRange),
}

/// Authenticated user as described by the access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionUser {
	/// Subject identifier (`sub`).
	pub id: String,
	/// E-mail address claim.
	pub email: Option<String>,
	/// Role claim (e.g. `USER`, `ADMIN`).
	pub role: Option<String>,
	/// Display name claim.
	pub name: Option<String>,
	/// Expiry instant (`exp`), when present.
	pub expires_at: Option<OffsetDateTime>,
}
impl SessionUser {
	/// Decodes the user view from `token`.
	pub fn from_token(token: &AccessToken) -> Result<Self, ClaimsError> {
		let mut segments = token.expose().split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) => payload,
			_ => return Err(ClaimsError::Malformed),
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let claims: RawClaims =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&bytes))?;
		let expires_at = claims.exp.map(OffsetDateTime::from_unix_timestamp).transpose()?;

		Ok(Self {
			id: claims.sub.into_string(),
			email: claims.email,
			role: claims.role,
			name: claims.name,
			expires_at,
		})
	}

	/// Returns `true` when the token carried an expiry at or before `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|exp| exp <= now)
	}
}

#[derive(Deserialize)]
struct RawClaims {
	sub: Subject,
	email: Option<String>,
	role: Option<String>,
	name: Option<String>,
	exp: Option<i64>,
}

// Some issuers emit numeric subjects.
#[derive(Deserialize)]
#[serde(untagged)]
enum Subject {
	Text(String),
	Number(u64),
}
impl Subject {
	fn into_string(self) -> String {
		match self {
			Self::Text(value) => value,
			Self::Number(value) => value.to_string(),
		}
	}
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> AccessToken {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	AccessToken::new(format!("{header}.{payload}.signature"))
}
