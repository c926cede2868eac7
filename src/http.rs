//! Transport primitives for authenticated API calls.
//!
//! The module exposes [`ApiTransport`] alongside the re-sendable [`ApiRequest`] and buffered
//! [`ApiResponse`] records so downstream crates can plug in any HTTP stack. The coordinator
//! composes around [`ApiTransport::send`]: it attaches the bearer credential on the way out and
//! inspects the status on the way back, so transports never see renewal mechanics.

// crates.io
pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
#[cfg(feature = "reqwest")] use reqwest::multipart::{Form, Part};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, TransportError},
};

pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing API calls.
///
/// The trait is the broker's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so one transport can be shared by the coordinator, the session layer,
/// and every consumer. The renewal credential is expected to travel out-of-band (for example in
/// a cookie jar owned by the transport); the broker never reads or writes it.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Performs one request/response cycle without any retry.
	///
	/// Non-success statuses are returned as responses, not errors. Only failures that prevent a
	/// response from arriving map to [`TransportError`].
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Re-sendable description of one API call.
#[derive(Clone)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute path relative to the API base URL (e.g. `/api/tasks`).
	pub path: String,
	/// Query parameters appended in order.
	pub query: Vec<(String, String)>,
	/// Request headers.
	pub headers: HeaderMap,
	/// Request body, if any.
	pub body: Option<RequestBody>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.query.push((key.into(), value.to_string()));

		self
	}

	/// Sets (or replaces) a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `payload` as the JSON body.
	pub fn json<T>(self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload)?;

		Ok(self.bytes(HeaderValue::from_static("application/json"), body))
	}

	/// Sets a raw body with its content type.
	pub fn bytes(mut self, content_type: HeaderValue, body: Vec<u8>) -> Self {
		self.headers.insert(header::CONTENT_TYPE, content_type);
		self.body = Some(RequestBody::Bytes(body));

		self
	}

	/// Sets a `multipart/form-data` body.
	///
	/// The parts stay in memory as plain data; the transport encodes them (and picks the
	/// boundary) on every send, so a replayed request carries the same files.
	pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
		self.headers.remove(header::CONTENT_TYPE);
		self.body = Some(RequestBody::Multipart(parts));

		self
	}

	/// Installs `token` as the bearer credential, replacing any previous one.
	pub fn set_bearer(&mut self, token: &AccessToken) {
		match HeaderValue::from_str(&token.bearer()) {
			Ok(mut value) => {
				value.set_sensitive(true);
				self.headers.insert(header::AUTHORIZATION, value);
			},
			// A token that cannot form a header value is sent unauthenticated and the server's
			// 401 drives the usual recovery.
			Err(_) => {
				self.headers.remove(header::AUTHORIZATION);
			},
		}
	}

	/// Returns the `Authorization` header, if present and valid UTF-8.
	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(header::AUTHORIZATION)?.to_str().ok()
	}

	/// Returns the path with any inline query string or trailing slash removed.
	pub fn route(&self) -> &str {
		let path = self.path.split(['?', '#']).next().unwrap_or_default();

		match path.trim_end_matches('/') {
			"" => "/",
			trimmed => trimmed,
		}
	}
}
impl Debug for ApiRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiRequest")
			.field("method", &self.method)
			.field("path", &self.path)
			.field("query", &self.query)
			.field("authorized", &self.headers.contains_key(header::AUTHORIZATION))
			.field("body", &self.body)
			.finish()
	}
}

/// Body of an [`ApiRequest`].
#[derive(Clone, PartialEq, Eq)]
pub enum RequestBody {
	/// Pre-encoded bytes; the content type travels in the request headers.
	Bytes(Vec<u8>),
	/// File parts of a `multipart/form-data` form, encoded by the transport.
	Multipart(Vec<FormPart>),
}
impl RequestBody {
	/// Raw bytes, when the body is not a form.
	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Self::Bytes(bytes) => Some(bytes),
			Self::Multipart(_) => None,
		}
	}

	/// Form parts, when the body is a form.
	pub fn parts(&self) -> Option<&[FormPart]> {
		match self {
			Self::Bytes(_) => None,
			Self::Multipart(parts) => Some(parts),
		}
	}
}
impl Debug for RequestBody {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Bytes(bytes) => f.debug_struct("Bytes").field("len", &bytes.len()).finish(),
			Self::Multipart(parts) => f.debug_tuple("Multipart").field(parts).finish(),
		}
	}
}

/// One file field of a multipart form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormPart {
	/// Form field name.
	pub name: String,
	/// File sent under the field.
	pub file: UploadFile,
}
impl FormPart {
	/// Pairs a field name with a file.
	pub fn new(name: impl Into<String>, file: UploadFile) -> Self {
		Self { name: name.into(), file }
	}
}

/// In-memory file selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
	/// File name sent in the part's `Content-Disposition`.
	pub name: String,
	/// MIME type; `application/octet-stream` when absent.
	pub content_type: Option<String>,
	/// File contents.
	pub bytes: Vec<u8>,
}
impl UploadFile {
	/// Creates an upload without an explicit MIME type.
	pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
		Self { name: name.into(), content_type: None, bytes: bytes.into() }
	}

	/// Sets the MIME type.
	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());

		self
	}

	/// MIME type the part is sent with.
	pub fn mime(&self) -> &str {
		self.content_type.as_deref().unwrap_or(OCTET_STREAM)
	}
}
impl Debug for UploadFile {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UploadFile")
			.field("name", &self.name)
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

/// Buffered response returned by an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates an empty response with the given status.
	pub fn new(status: StatusCode) -> Self {
		Self { status, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Creates a JSON response, mostly useful for scripted transports.
	pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
		let mut response = Self::new(status);

		response.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
		response.body = value.to_string().into_bytes();

		response
	}

	/// Returns `true` for the authorization-failure status that enters recovery.
	pub fn is_auth_failure(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Returns a header value as a string slice, if present and valid UTF-8.
	pub fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
		self.headers.get(name)?.to_str().ok()
	}

	/// Decodes the body as JSON, naming the failing field on mismatch.
	pub fn json<T>(&self, path: &str) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		decode_json(&self.body).map_err(|source| Error::Decode { path: path.to_owned(), source })
	}

	/// Converts non-success statuses into [`Error`]s.
	pub fn error_for_status(self, path: &str) -> Result<Self> {
		if self.status.is_success() {
			return Ok(self);
		}
		if self.is_auth_failure() {
			return Err(Error::Unauthorized { path: path.to_owned() });
		}

		let message = serde_json::from_slice::<ErrorBody>(&self.body).ok().and_then(|b| b.message);

		Err(Error::Status { status: self.status.as_u16(), path: path.to_owned(), message })
	}
}

#[derive(Deserialize)]
struct ErrorBody {
	message: Option<String>,
}

pub(crate) fn decode_json<T>(
	body: &[u8],
) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: serde::de::DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
}

/// Transport backed by a shared [`ReqwestClient`].
///
/// Paths are resolved against the base URL. The client keeps a cookie store so the
/// HTTP-only renewal cookie set by the login and refresh endpoints is replayed automatically.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with a fresh cookie-enabled client.
	pub fn new(base_url: Url) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).build()?;

		Ok(Self::with_client(client, base_url))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]. Enable its cookie store so renewal works.
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url }
	}

	/// Base URL every request path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn resolve(&self, request: &ApiRequest) -> Result<Url, ConfigError> {
		let mut url = self.base_url.join(request.path.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidRequestPath { path: request.path.clone(), source }
		})?;

		if !request.query.is_empty() {
			url.query_pairs_mut().extend_pairs(request.query.iter());
		}

		Ok(url)
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = self.resolve(&request)?;
			let path = request.path;
			let mut builder = self.client.request(request.method, url).headers(request.headers);

			match request.body {
				Some(RequestBody::Bytes(body)) => builder = builder.body(body),
				Some(RequestBody::Multipart(parts)) =>
					builder = builder.multipart(multipart_form(parts)?),
				None => {},
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(path.as_str(), e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| TransportError::network(path.as_str(), e))?;

			Ok(ApiResponse { status, headers, body: body.to_vec() })
		})
	}
}

#[cfg(feature = "reqwest")]
fn multipart_form(parts: Vec<FormPart>) -> Result<Form, ConfigError> {
	let mut form = Form::new();

	for FormPart { name, file } in parts {
		let content_type = file.mime().to_owned();
		let part = Part::bytes(file.bytes).file_name(file.name).mime_str(&content_type).map_err(
			|e| ConfigError::InvalidContentType { content_type, source: Box::new(e) },
		)?;

		form = form.part(name, part);
	}

	Ok(form)
}
