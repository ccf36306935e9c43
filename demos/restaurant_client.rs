//! Demonstrates the gateway recovering two concurrent requests from an expired access token
//! with a single refresh call against a mocked restaurant backend.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use bearer_gateway::{
	auth::CredentialPair,
	config::GatewayConfig,
	gateway::Gateway,
	http::{ApiRequest, ReqwestTransport},
	reqwest::Client,
	route::MemoryRouter,
	store::MemoryCredentialStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	for (path, token, status) in [
		("/orders", "expired", 401),
		("/tables", "expired", 401),
		("/orders", "renewed", 200),
		("/tables", "renewed", 200),
	] {
		server
			.mock_async(move |when, then| {
				when.method(GET).path(path).header("authorization", format!("Bearer {token}"));
				then.status(status).header("content-type", "application/json").body("[]");
			})
			.await;
	}

	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.delay(Duration::from_millis(200))
				.body("{\"accessToken\":\"renewed\",\"refreshToken\":\"refresh-2\"}");
		})
		.await;
	let store = MemoryCredentialStore::with_pair(CredentialPair::new("expired", "refresh-1"));
	let router = MemoryRouter::at("/orders");
	let config = GatewayConfig::builder(Url::parse(&server.url("/auth/refresh"))?).build()?;
	let transport = ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let gateway = <Gateway<ReqwestTransport>>::with_transport(
		Arc::new(store.clone()),
		Arc::new(router.clone()),
		config,
		transport,
	);
	let orders_url = Url::parse(&server.url("/orders"))?;
	let tables_url = Url::parse(&server.url("/tables"))?;
	let (orders, tables) = tokio::join!(
		gateway.intercept(ApiRequest::get(orders_url)),
		gateway.intercept(ApiRequest::get(tables_url)),
	);

	println!("Orders: {}.", orders?.status);
	println!("Tables: {}.", tables?.status);
	println!("Refresh attempts: {}.", gateway.refresh_metrics().attempts());

	refresh_mock.assert_calls_async(1).await;

	Ok(())
}
