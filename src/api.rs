//! Typed consumers of the task API.
//!
//! Consumers know nothing about tokens: every call goes through [`TokenCoordinator::send`], which
//! attaches the credential and absorbs one credential expiry per request.

pub mod attachments;
pub mod tasks;
pub mod users;

pub use attachments::*;
pub use tasks::*;
pub use users::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	coordinator::TokenCoordinator,
	http::{ApiRequest, ApiResponse, ApiTransport},
};

/// One page of a server-side paginated listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
	/// Items on this page.
	pub content: Vec<T>,
	/// Zero-based page index.
	pub page: u32,
	/// Requested page size.
	pub size: u32,
	/// Total number of items across all pages.
	pub total_elements: u64,
	/// Total number of pages.
	pub total_pages: u32,
	/// Whether this is the first page.
	pub first: bool,
	/// Whether this is the last page.
	pub last: bool,
}

async fn send_checked<T>(
	coordinator: &TokenCoordinator<T>,
	request: ApiRequest,
) -> Result<ApiResponse>
where
	T: ?Sized + ApiTransport,
{
	let path = request.path.clone();

	coordinator.send(request).await?.error_for_status(&path)
}

async fn fetch_json<T, R>(coordinator: &TokenCoordinator<T>, request: ApiRequest) -> Result<R>
where
	T: ?Sized + ApiTransport,
	R: DeserializeOwned,
{
	let path = request.path.clone();

	send_checked(coordinator, request).await?.json(&path)
}
