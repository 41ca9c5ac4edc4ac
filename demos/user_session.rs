//! Demonstrates delegated user tokens: the session's expired access token is renewed with its
//! refresh token, and the rotated refresh token is written back to the session.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use oauth2_token_manager::{
	auth::{AccessToken, SubjectId},
	client::ClientDescriptor,
	endpoint::OAuth2Endpoint,
	manager::{TokenManager, UserContext},
	middleware::UserTokenMiddleware,
	reqwest::Client,
	reqwest_middleware::ClientBuilder,
	session::{MemorySessionStore, SessionKey, UserTokens},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-from-sign-in");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"renewed-access\",\"token_type\":\"bearer\",\"expires_in\":600,\"refresh_token\":\"rotated-refresh\"}",
			);
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer renewed-access");
			then.status(200).header("content-type", "application/json").body("{\"name\":\"Ada\"}");
		})
		.await;
	let user = UserContext::new(SubjectId::new("ada")?);
	let session_key = SessionKey::new(user.subject.clone(), None);
	let sessions = MemorySessionStore::default();

	// Tokens captured at sign-in; the access token has already expired.
	sessions.insert(
		session_key.clone(),
		UserTokens::new(
			AccessToken::new("signed-in-access", OffsetDateTime::now_utc() - Duration::minutes(5)),
			Some("refresh-from-sign-in".into()),
		),
	);

	let descriptor = ClientDescriptor::builder("web-app".parse()?)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.client_id("web-app")
		.client_secret("web-secret")
		.build()?;
	let manager = TokenManager::builder(OAuth2Endpoint::default())
		.sessions(Arc::new(sessions.clone()))
		.user_client(None, descriptor)
		.build();
	let client =
		ClientBuilder::new(Client::new()).with(UserTokenMiddleware::new(manager)).build();
	let response = client.get(server.url("/me")).with_extension(user).send().await?;
	let status = response.status();

	println!("GET /me -> {status}: {}.", response.text().await?);

	if let Some(tokens) = sessions.get(&session_key) {
		println!(
			"Session refresh token is now `{}`.",
			tokens.refresh_token.as_ref().map_or("<none>", |token| token.expose())
		);
	}

	token_mock.assert_async().await;
	profile_mock.assert_async().await;

	Ok(())
}
