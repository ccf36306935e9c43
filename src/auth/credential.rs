//! Credential pair held by the store and the refresh endpoint's wire payloads.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access + refresh token pair owned by a [`CredentialStore`](crate::store::CredentialStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
	/// Short-lived credential attached to outbound requests.
	pub access_token: TokenSecret,
	/// Longer-lived credential exchanged for a new access token.
	pub refresh_token: Option<TokenSecret>,
}
impl CredentialPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: Some(TokenSecret::new(refresh_token)),
		}
	}

	/// Creates a pair without a refresh token.
	pub fn access_only(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None }
	}
}

/// JSON body sent to the refresh endpoint: `{"refreshToken": "..."}`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
	/// Refresh token presented to the backend.
	pub refresh_token: TokenSecret,
}

/// JSON body returned by the refresh endpoint: `{"accessToken": "...", "refreshToken": "..."}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedCredentials {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the backend issued one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
impl RefreshedCredentials {
	/// Merges the response with the refresh token that was presented, keeping it when the
	/// backend did not rotate it.
	pub fn into_pair(self, presented: TokenSecret) -> CredentialPair {
		CredentialPair {
			access_token: self.access_token,
			refresh_token: Some(self.refresh_token.unwrap_or(presented)),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_grant_uses_camel_case() {
		let grant = RefreshGrant { refresh_token: TokenSecret::new("refresh-1") };
		let payload =
			serde_json::to_string(&grant).expect("Refresh grant should serialize to JSON.");

		assert_eq!(payload, "{\"refreshToken\":\"refresh-1\"}");
	}

	#[test]
	fn missing_rotation_keeps_presented_refresh_token() {
		let refreshed: RefreshedCredentials = serde_json::from_str("{\"accessToken\":\"access-2\"}")
			.expect("Refresh response without rotation should parse.");
		let pair = refreshed.into_pair(TokenSecret::new("refresh-1"));

		assert_eq!(pair.access_token.expose(), "access-2");
		assert_eq!(pair.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
	}

	#[test]
	fn rotation_replaces_refresh_token() {
		let refreshed: RefreshedCredentials =
			serde_json::from_str("{\"accessToken\":\"access-2\",\"refreshToken\":\"refresh-2\"}")
				.expect("Refresh response with rotation should parse.");
		let pair = refreshed.into_pair(TokenSecret::new("refresh-1"));

		assert_eq!(pair.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
	}
}
