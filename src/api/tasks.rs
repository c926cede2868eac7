//! Task listing, lookup, and creation.

// crates.io
use time::{Date, PrimitiveDateTime};
// self
use crate::{
	_prelude::*,
	api::{self, Page},
	coordinator::TokenCoordinator,
	http::{ApiRequest, ApiTransport},
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");
time::serde::format_description!(
	local_date_time,
	PrimitiveDateTime,
	"[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

const TASKS_PATH: &str = "/api/tasks";
const CREATE_PATH: &str = "/api/tasks/create";

/// Workflow state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
	/// Created, not started.
	Todo,
	/// Being worked on.
	InProgress,
	/// Waiting for review or approval.
	Review,
	/// Finished.
	Done,
	/// Paused.
	OnHold,
	/// Abandoned.
	Canceled,
}
impl TaskStatus {
	/// Wire representation used in query strings.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Todo => "TODO",
			Self::InProgress => "IN_PROGRESS",
			Self::Review => "REVIEW",
			Self::Done => "DONE",
			Self::OnHold => "ON_HOLD",
			Self::Canceled => "CANCELED",
		}
	}
}

/// Task priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
	#[allow(missing_docs)]
	Low,
	#[allow(missing_docs)]
	#[default]
	Medium,
	#[allow(missing_docs)]
	High,
}

/// Who may see a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskVisibility {
	/// Company-wide.
	Public,
	/// Owning department only.
	Department,
	/// Creator and assignee only.
	Private,
}

/// Listing filter understood by `GET /api/tasks`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
	/// Every task visible to the caller.
	#[default]
	All,
	/// Company-wide tasks.
	Public,
	/// Tasks of the caller's department.
	Team,
	/// Tasks the caller created.
	Created,
	/// Tasks assigned to the caller.
	Assigned,
}
impl TaskScope {
	/// Wire representation used in query strings.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::All => "all",
			Self::Public => "public",
			Self::Team => "team",
			Self::Created => "created",
			Self::Assigned => "assigned",
		}
	}
}

/// Task as returned by the server.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
	pub id: i64,
	pub title: String,
	#[serde(default)]
	pub description: Option<String>,
	pub status: TaskStatus,
	pub priority: TaskPriority,
	#[serde(default)]
	pub visibility: Option<TaskVisibility>,
	#[serde(default, with = "iso_date::option")]
	pub due_date: Option<Date>,
	#[serde(default, with = "local_date_time::option")]
	pub created_at: Option<PrimitiveDateTime>,
	#[serde(default)]
	pub created_by_id: Option<i64>,
	#[serde(default)]
	pub created_by_name: Option<String>,
	#[serde(default)]
	pub created_by_department_name: Option<String>,
	#[serde(default)]
	pub created_by_department_code: Option<String>,
	#[serde(default)]
	pub assignee_id: Option<i64>,
	#[serde(default)]
	pub assignee_name: Option<String>,
	#[serde(default)]
	pub assignee_department_name: Option<String>,
	#[serde(default)]
	pub assignee_department_code: Option<String>,
	#[serde(default)]
	pub owner_department_name: Option<String>,
	#[serde(default)]
	pub owner_department_code: Option<String>,
	#[serde(default)]
	pub work_department_name: Option<String>,
	#[serde(default)]
	pub work_department_code: Option<String>,
}

/// Listing parameters. Defaults match the server's: every visible task, first page of nine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskQuery {
	/// Visibility filter.
	pub scope: TaskScope,
	/// Optional status filter.
	pub status: Option<TaskStatus>,
	/// Zero-based page index.
	pub page: u32,
	/// Page size.
	pub size: u32,
}
impl TaskQuery {
	/// Narrows the listing to `scope`.
	pub fn scope(mut self, scope: TaskScope) -> Self {
		self.scope = scope;

		self
	}

	/// Narrows the listing to one status.
	pub fn status(mut self, status: TaskStatus) -> Self {
		self.status = Some(status);

		self
	}

	/// Selects a page.
	pub fn page(mut self, page: u32, size: u32) -> Self {
		self.page = page;
		self.size = size;

		self
	}

	fn apply(&self, mut request: ApiRequest) -> ApiRequest {
		request = request.query("scope", self.scope.as_str());

		if let Some(status) = self.status {
			request = request.query("status", status.as_str());
		}

		request.query("page", self.page).query("size", self.size)
	}
}
impl Default for TaskQuery {
	fn default() -> Self {
		Self { scope: TaskScope::All, status: None, page: 0, size: 9 }
	}
}

/// Body of `POST /api/tasks/create`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
	/// Task title.
	pub title: String,
	/// Rich-text description.
	pub description: Option<String>,
	/// Initial status; the server picks one when absent.
	pub status: Option<TaskStatus>,
	/// Priority; the server picks one when absent.
	pub priority: Option<TaskPriority>,
	/// Requested visibility. Servers that do not take it from the request ignore the field.
	pub visibility: Option<TaskVisibility>,
	/// Due date.
	#[serde(default, with = "iso_date::option")]
	pub due_date: Option<Date>,
	/// Assigned user.
	pub assignee_id: Option<i64>,
}
impl TaskDraft {
	/// Starts a draft with only a title.
	pub fn new(title: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			description: None,
			status: None,
			priority: None,
			visibility: None,
			due_date: None,
			assignee_id: None,
		}
	}
}

/// Task endpoints.
pub struct TaskApi<T>
where
	T: ?Sized + ApiTransport,
{
	coordinator: TokenCoordinator<T>,
}
impl<T> TaskApi<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a consumer sharing `coordinator`'s token state.
	pub fn new(coordinator: TokenCoordinator<T>) -> Self {
		Self { coordinator }
	}

	/// Lists tasks page by page.
	pub async fn list(&self, query: &TaskQuery) -> Result<Page<Task>> {
		api::fetch_json(&self.coordinator, query.apply(ApiRequest::get(TASKS_PATH))).await
	}

	/// Fetches one task.
	pub async fn get(&self, id: i64) -> Result<Task> {
		api::fetch_json(&self.coordinator, ApiRequest::get(format!("{TASKS_PATH}/{id}"))).await
	}

	/// Creates a task and returns the stored record.
	pub async fn create(&self, draft: &TaskDraft) -> Result<Task> {
		let request = ApiRequest::post(CREATE_PATH).json(draft)?;

		api::fetch_json(&self.coordinator, request).await
	}
}
impl<T> Clone for TaskApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone() }
	}
}
impl<T> Debug for TaskApi<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TaskApi").field("coordinator", &self.coordinator).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::{date, datetime};
	// self
	use super::*;

	#[test]
	fn task_decodes_server_shape() {
		let task: Task = serde_json::from_value(serde_json::json!({
			"id": 7,
			"title": "Quarterly report",
			"description": null,
			"status": "IN_PROGRESS",
			"priority": "HIGH",
			"visibility": "DEPARTMENT",
			"dueDate": "2025-03-31",
			"createdAt": "2025-03-01T09:30:15.123456",
			"createdById": 1,
			"createdByName": "Kim",
			"assigneeId": null
		}))
		.expect("Server task payload should decode.");

		assert_eq!(task.status, TaskStatus::InProgress);
		assert_eq!(task.priority, TaskPriority::High);
		assert_eq!(task.visibility, Some(TaskVisibility::Department));
		assert_eq!(task.due_date, Some(date!(2025 - 03 - 31)));
		assert_eq!(task.created_at, Some(datetime!(2025-03-01 09:30:15.123456)));
		assert_eq!(task.assignee_id, None);
		assert_eq!(task.work_department_code, None);
	}

	#[test]
	fn created_at_accepts_whole_seconds() {
		let task: Task = serde_json::from_value(serde_json::json!({
			"id": 1,
			"title": "t",
			"status": "TODO",
			"priority": "LOW",
			"createdAt": "2025-03-01T09:30:15"
		}))
		.expect("Timestamps without fractions should decode.");

		assert_eq!(task.created_at, Some(datetime!(2025-03-01 09:30:15)));
	}

	#[test]
	fn draft_serializes_camel_case_with_iso_date() {
		let mut draft = TaskDraft::new("Ship it");

		draft.priority = Some(TaskPriority::Medium);
		draft.visibility = Some(TaskVisibility::Department);
		draft.due_date = Some(date!(2025 - 04 - 01));
		draft.assignee_id = Some(3);

		let body = serde_json::to_value(&draft).expect("Drafts should serialize.");

		assert_eq!(
			body,
			serde_json::json!({
				"title": "Ship it",
				"description": null,
				"status": null,
				"priority": "MEDIUM",
				"visibility": "DEPARTMENT",
				"dueDate": "2025-04-01",
				"assigneeId": 3
			})
		);
	}

	#[test]
	fn query_renders_filters_in_order() {
		let request = TaskQuery::default()
			.scope(TaskScope::Assigned)
			.status(TaskStatus::OnHold)
			.page(2, 20)
			.apply(ApiRequest::get(TASKS_PATH));
		let pairs: Vec<_> =
			request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

		assert_eq!(
			pairs,
			[("scope", "assigned"), ("status", "ON_HOLD"), ("page", "2"), ("size", "20")]
		);

		let defaults = TaskQuery::default().apply(ApiRequest::get(TASKS_PATH));

		assert_eq!(defaults.query.len(), 3);
	}

	#[test]
	fn wire_names_match_serde() {
		for status in [
			TaskStatus::Todo,
			TaskStatus::InProgress,
			TaskStatus::Review,
			TaskStatus::Done,
			TaskStatus::OnHold,
			TaskStatus::Canceled,
		] {
			assert_eq!(serde_json::json!(status), serde_json::json!(status.as_str()));
		}
		for scope in [
			TaskScope::All,
			TaskScope::Public,
			TaskScope::Team,
			TaskScope::Created,
			TaskScope::Assigned,
		] {
			assert_eq!(serde_json::json!(scope), serde_json::json!(scope.as_str()));
		}
	}
}
