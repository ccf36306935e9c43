//! Bearer-credential request gateway: attach access tokens to outbound requests, share one
//! refresh among every request that hits an expired token, replay them with the new
//! credential, and terminate the session only when recovery is impossible.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod route;
pub mod store;
pub mod terminator;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests and demos.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::CredentialPair,
		config::GatewayConfig,
		gateway::{Gateway, ReqwestGateway},
		http::ReqwestTransport,
		route::MemoryRouter,
		store::MemoryCredentialStore,
	};

	/// Handles returned by [`build_reqwest_test_gateway`].
	pub struct TestGateway {
		/// Gateway under test.
		pub gateway: ReqwestGateway,
		/// Store shared with the gateway.
		pub store: MemoryCredentialStore,
		/// Router shared with the gateway.
		pub router: MemoryRouter,
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`Gateway`] over an in-memory store seeded with `pair`, a router positioned
	/// at `route`, and a refresh endpoint at `refresh_url`.
	pub fn build_reqwest_test_gateway(
		refresh_url: &str,
		pair: Option<CredentialPair>,
		route: &str,
	) -> TestGateway {
		let store = pair.map(MemoryCredentialStore::with_pair).unwrap_or_default();
		let router = MemoryRouter::at(route);
		let config = GatewayConfig::builder(
			Url::parse(refresh_url).expect("Refresh URL for tests should parse."),
		)
		.build()
		.expect("Gateway configuration for tests should build.");
		let gateway = Gateway::with_transport(
			Arc::new(store.clone()),
			Arc::new(router.clone()),
			config,
			test_reqwest_transport(),
		);

		TestGateway { gateway, store, router }
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
