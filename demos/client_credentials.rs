//! Demonstrates attaching back-channel tokens to outgoing requests with
//! [`ClientCredentialsMiddleware`], reusing the cached token across calls.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_manager::{
	auth::{ClientName, ScopeSet},
	client::{ClientAuthMethod, ClientDescriptor},
	endpoint::OAuth2Endpoint,
	manager::{TokenManager, TokenRequestParameters},
	middleware::ClientCredentialsMiddleware,
	reqwest::Client,
	reqwest_middleware::ClientBuilder,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("scope", "reports.read");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let reports_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/reports").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let name = ClientName::new("reporting")?;
	let descriptor = ClientDescriptor::builder(name.clone())
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.client_id("demo-client")
		.client_secret("super-secret")
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let manager = TokenManager::builder(OAuth2Endpoint::reqwest(Client::new()))
		.client(descriptor)
		.build();
	let parameters = TokenRequestParameters::new().with_scope(ScopeSet::new(["reports.read"])?);
	let middleware =
		ClientCredentialsMiddleware::new(manager.clone(), name).with_parameters(parameters);
	let client = ClientBuilder::new(Client::new()).with(middleware).build();

	for _ in 0..3 {
		let response = client.get(server.url("/reports")).send().await?;

		println!("GET /reports -> {}.", response.status());
	}

	let metrics = manager.cache_metrics();

	println!(
		"Token acquisitions: {}, cache hits: {}.",
		metrics.acquisitions(),
		metrics.hits()
	);

	token_mock.assert_async().await;
	reports_mock.assert_calls_async(3).await;

	Ok(())
}
