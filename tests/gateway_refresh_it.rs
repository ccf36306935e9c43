#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use bearer_gateway::{
	_preludet::*,
	auth::{CredentialPair, TokenSecret},
	gateway::SessionRestore,
	http::ApiRequest,
};

fn get(server: &MockServer, path: &str) -> ApiRequest {
	ApiRequest::get(Url::parse(&server.url(path)).expect("Mock URL should parse successfully."))
}

async fn mock_protected<'a>(server: &'a MockServer, path: &str, token: &str, status: u16) -> httpmock::Mock<'a> {
	let path = path.to_owned();
	let bearer = format!("Bearer {token}");

	server
		.mock_async(move |when, then| {
			when.method(GET).path(path.clone()).header("authorization", bearer);
			then.status(status).header("content-type", "application/json").body(format!(
				"{{\"path\":\"{path}\"}}"
			));
		})
		.await
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	let server = MockServer::start_async().await;
	let TestGateway { gateway, store, router } = build_reqwest_test_gateway(
		&server.url("/auth/refresh"),
		Some(CredentialPair::new("stale", "refresh-1")),
		"/orders",
	);
	let orders_stale = mock_protected(&server, "/orders", "stale", 401).await;
	let tables_stale = mock_protected(&server, "/tables", "stale", 401).await;
	let orders_fresh = mock_protected(&server, "/orders", "fresh", 200).await;
	let tables_fresh = mock_protected(&server, "/tables", "fresh", 200).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").json_body(json!({ "refreshToken": "refresh-1" }));
			then.status(200)
				.header("content-type", "application/json")
				.delay(Duration::from_millis(300))
				.json_body(json!({ "accessToken": "fresh", "refreshToken": "refresh-2" }));
		})
		.await;
	let (orders, tables) = tokio::join!(
		gateway.intercept(get(&server, "/orders")),
		gateway.intercept(get(&server, "/tables")),
	);
	let orders = orders.expect("Orders request should be replayed successfully.");
	let tables = tables.expect("Tables request should be replayed successfully.");

	assert_eq!(orders.text(), "{\"path\":\"/orders\"}");
	assert_eq!(tables.text(), "{\"path\":\"/tables\"}");

	refresh.assert_calls_async(1).await;
	orders_stale.assert_calls_async(1).await;
	tables_stale.assert_calls_async(1).await;
	orders_fresh.assert_calls_async(1).await;
	tables_fresh.assert_calls_async(1).await;

	assert_eq!(gateway.refresh_metrics().attempts(), 1);
	assert_eq!(gateway.refresh_metrics().successes(), 1);
	assert_eq!(gateway.refresh_metrics().waiters(), 1);

	let stored = store.snapshot().expect("Rotated credentials should be stored.");

	assert_eq!(stored.access_token.expose(), "fresh");
	assert_eq!(stored.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
	assert!(router.navigations().is_empty());
}

#[tokio::test]
async fn later_failures_start_a_new_cycle() {
	let server = MockServer::start_async().await;
	let TestGateway { gateway, .. } = build_reqwest_test_gateway(
		&server.url("/auth/refresh"),
		Some(CredentialPair::new("stale", "refresh-1")),
		"/orders",
	);
	let _orders_stale = mock_protected(&server, "/orders", "stale", 401).await;
	let _orders_fresh = mock_protected(&server, "/orders", "fresh", 200).await;
	let _tables_fresh = mock_protected(&server, "/tables", "fresh", 401).await;
	let _tables_newer = mock_protected(&server, "/tables", "newer", 200).await;
	let first_refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").json_body(json!({ "refreshToken": "refresh-1" }));
			then.status(200).json_body(json!({ "accessToken": "fresh", "refreshToken": "refresh-2" }));
		})
		.await;
	let second_refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").json_body(json!({ "refreshToken": "refresh-2" }));
			then.status(200).json_body(json!({ "accessToken": "newer" }));
		})
		.await;

	gateway.intercept(get(&server, "/orders")).await.expect("First request should be replayed.");
	gateway.intercept(get(&server, "/tables")).await.expect("Second request should be replayed.");

	first_refresh.assert_calls_async(1).await;
	second_refresh.assert_calls_async(1).await;

	assert_eq!(gateway.refresh_metrics().attempts(), 2);
}

#[tokio::test]
async fn replay_failure_is_not_refreshed_again() {
	let server = MockServer::start_async().await;
	let TestGateway { gateway, store, .. } = build_reqwest_test_gateway(
		&server.url("/auth/refresh"),
		Some(CredentialPair::new("stale", "refresh-1")),
		"/orders",
	);
	let _orders_stale = mock_protected(&server, "/orders", "stale", 401).await;
	let orders_fresh = mock_protected(&server, "/orders", "fresh", 403).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "fresh" }));
		})
		.await;
	let err = gateway
		.intercept(get(&server, "/orders"))
		.await
		.expect_err("Forbidden replay should surface to the caller.");

	assert!(matches!(err, Error::Passthrough(_)));
	assert_eq!(err.status(), Some(403));

	refresh.assert_calls_async(1).await;
	orders_fresh.assert_calls_async(1).await;

	assert!(!store.is_empty());
}

#[tokio::test]
async fn restore_session_recovers_through_refresh() {
	let server = MockServer::start_async().await;
	let TestGateway { gateway, .. } = build_reqwest_test_gateway(
		&server.url("/auth/refresh"),
		Some(CredentialPair::new("stale", "refresh-1")),
		"/dashboard",
	);
	let _me_stale = mock_protected(&server, "/users/me", "stale", 401).await;
	let _me_fresh = mock_protected(&server, "/users/me", "fresh", 200).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(json!({ "accessToken": "fresh" }));
		})
		.await;
	let restored = gateway
		.restore_session(get(&server, "/users/me"))
		.await
		.expect("Session restoration should succeed.");

	match restored {
		SessionRestore::Restored(response) =>
			assert_eq!(response.text(), "{\"path\":\"/users/me\"}"),
		other => panic!("Unexpected restoration outcome: {other:?}."),
	}

	refresh.assert_async().await;
}
