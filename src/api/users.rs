//! Directory lookups used when assigning tasks.

// self
use crate::{
	_prelude::*,
	api,
	coordinator::TokenCoordinator,
	http::{ApiRequest, ApiTransport},
};

const ASSIGNEES_PATH: &str = "/api/user/assigneelist";

/// Minimal user record offered as a task assignee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
	/// User identifier, suitable for [`TaskDraft::assignee_id`](crate::api::TaskDraft).
	pub id: i64,
	/// Display name.
	pub name: String,
	/// Department name, if the user belongs to one.
	#[serde(default)]
	pub department: Option<String>,
}

/// User directory endpoints.
pub struct UserApi<T>
where
	T: ?Sized + ApiTransport,
{
	coordinator: TokenCoordinator<T>,
}
impl<T> UserApi<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a consumer sharing `coordinator`'s token state.
	pub fn new(coordinator: TokenCoordinator<T>) -> Self {
		Self { coordinator }
	}

	/// Lists every user a task can be assigned to.
	pub async fn assignees(&self) -> Result<Vec<UserSummary>> {
		api::fetch_json(&self.coordinator, ApiRequest::get(ASSIGNEES_PATH)).await
	}
}
impl<T> Clone for UserApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone() }
	}
}
impl<T> Debug for UserApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserApi").field("coordinator", &self.coordinator).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn summary_decodes_directory_entry() {
		let users: Vec<UserSummary> = serde_json::from_value(serde_json::json!([
			{ "id": 3, "name": "Lee", "department": "Platform" },
			{ "id": 4, "name": "Park", "department": null }
		]))
		.expect("Assignee list should decode.");

		assert_eq!((users[0].id, users[0].name.as_str()), (3, "Lee"));
		assert_eq!(users[0].department.as_deref(), Some("Platform"));
		assert_eq!(users[1].department, None);
	}
}
