//! Restores a session from the renewal cookie on startup, then lists tasks against a mock API.
//!
//! The mock issues the cookie at login, answers the first listing with `401` to simulate an
//! expired access token, and hands out a fresh token from `/api/refresh`. The mock serves a
//! self-signed certificate, so the demo client skips certificate checks; never do that against
//! a real server.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use session_broker::{
	api::{TaskApi, TaskQuery},
	config::ClientConfig,
	coordinator::TokenCoordinator,
	http::ReqwestTransport,
	reqwest::Client,
	session::{Credentials, SessionClient},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/refresh").header("cookie", "refreshToken=demo");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":\"fresh-access\"}");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/login");
			then.status(200)
				.header("content-type", "application/json")
				.header("set-cookie", "refreshToken=demo; Path=/; HttpOnly")
				.body("{\"accessToken\":\"stale-access\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/logout");
			then.status(204);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/tasks").header("authorization", "Bearer stale-access");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/tasks").header("authorization", "Bearer fresh-access");
			then.status(200).json_body(serde_json::json!({
				"content": [{
					"id": 1,
					"title": "Write release notes",
					"status": "TODO",
					"priority": "HIGH"
				}],
				"page": 0,
				"size": 9,
				"totalElements": 1,
				"totalPages": 1,
				"first": true,
				"last": true
			}));
		})
		.await;

	let base_url = Url::parse(&server.base_url())?;
	let config = ClientConfig::builder(base_url.clone()).build()?;
	let client = Client::builder()
		.cookie_store(true)
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let coordinator =
		TokenCoordinator::new(&config, ReqwestTransport::with_client(client, base_url));
	let session = SessionClient::new(config, coordinator.clone());

	println!("Bootstrap on /login: {:?}.", session.bootstrap("/login").await);

	session.login(&Credentials::new("kim@example.com", "demo-password")).await?;

	let page = TaskApi::new(coordinator.clone()).list(&TaskQuery::default()).await?;

	for task in &page.content {
		println!("Task #{} {:?}: {}.", task.id, task.status, task.title);
	}

	println!(
		"Renewals started: {}; requests retried: {}.",
		coordinator.metrics().renewals_started(),
		coordinator.metrics().retries()
	);

	refresh_mock.assert_async().await;
	session.logout().await?;

	println!("Signed out: {:?}.", session.state());

	Ok(())
}
