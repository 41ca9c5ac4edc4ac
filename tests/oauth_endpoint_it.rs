// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use oauth2_token_manager::{
	assertion::{ClientAssertion, JWT_BEARER_ASSERTION_TYPE},
	auth::ScopeSet,
	client::ClientAuthMethod,
	endpoint::{
		ClientCredential, GrantType, OAuth2Endpoint, TokenEndpoint, TokenEndpointRequest,
	},
	error::Error,
	url::Url,
};

const BASIC_AUTHORIZATION: &str = "Basic YmlsbGluZy1jbGllbnQ6YmlsbGluZy1zZWNyZXQ=";

fn request(server: &MockServer, auth_method: ClientAuthMethod) -> TokenEndpointRequest {
	TokenEndpointRequest {
		grant: GrantType::ClientCredentials,
		address: Url::parse(&server.url("/token")).expect("Mock token endpoint should parse."),
		client_id: "billing-client".into(),
		auth_method,
		credential: ClientCredential::Secret("billing-secret".into()),
		scope: Some(ScopeSet::new(["invoices.read"]).expect("Scope should be valid.")),
		resource: None,
		parameters: Default::default(),
		refresh_token: None,
		context: Default::default(),
	}
}

#[tokio::test]
async fn client_secret_basic_uses_the_authorization_header() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("authorization", BASIC_AUTHORIZATION)
				.form_urlencoded_tuple("grant_type", "client_credentials")
				.form_urlencoded_tuple("scope", "invoices.read");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"basic-token\",\"token_type\":\"bearer\",\"expires_in\":900,\"scope\":\"invoices.read\"}",
			);
		})
		.await;
	let response = OAuth2Endpoint::default()
		.request_token(request(&server, ClientAuthMethod::ClientSecretBasic))
		.await
		.expect("Token request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "basic-token");
	assert_eq!(response.expires_in, Some(Duration::seconds(900)));
	assert_eq!(
		response.scope.as_ref().map(|scope| scope.normalized()).as_deref(),
		Some("invoices.read")
	);
	assert!(response.refresh_token.is_none());
}

#[tokio::test]
async fn client_secret_post_sends_credentials_in_the_form() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("client_id", "billing-client")
				.form_urlencoded_tuple("client_secret", "billing-secret");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"post-token\",\"token_type\":\"bearer\"}");
		})
		.await;
	let response = OAuth2Endpoint::default()
		.request_token(request(&server, ClientAuthMethod::ClientSecretPost))
		.await
		.expect("Token request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "post-token");
	assert!(response.expires_in.is_none());
}

#[tokio::test]
async fn assertions_and_resource_are_sent_as_form_fields() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("client_id", "billing-client")
				.form_urlencoded_tuple("client_assertion_type", JWT_BEARER_ASSERTION_TYPE)
				.form_urlencoded_tuple("client_assertion", "header.claims.signature")
				.form_urlencoded_tuple("resource", "https://api.example.com")
				.form_urlencoded_tuple("audience", "billing-api");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"jwt-token\",\"token_type\":\"bearer\",\"expires_in\":60}");
		})
		.await;
	let mut request = request(&server, ClientAuthMethod::PrivateKeyJwt);

	request.credential =
		ClientCredential::Assertion(ClientAssertion::jwt_bearer("header.claims.signature"));
	request.resource = Some("https://api.example.com".into());
	request.parameters.insert("audience".into(), "billing-api".into());

	let response = OAuth2Endpoint::default()
		.request_token(request)
		.await
		.expect("Assertion request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "jwt-token");
}

#[tokio::test]
async fn refresh_grant_returns_the_rotated_refresh_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"user-token\",\"token_type\":\"bearer\",\"expires_in\":600,\"refresh_token\":\"refresh-2\"}",
			);
		})
		.await;
	let mut request = request(&server, ClientAuthMethod::ClientSecretPost);

	request.grant = GrantType::RefreshToken;
	request.refresh_token = Some("refresh-1".into());

	let response = OAuth2Endpoint::default()
		.request_token(request)
		.await
		.expect("Refresh request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "user-token");
	assert_eq!(response.refresh_token.as_ref().map(|token| token.expose()), Some("refresh-2"));
}

#[tokio::test]
async fn oauth_errors_keep_code_and_status() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_client\",\"error_description\":\"Client authentication failed.\"}",
			);
		})
		.await;
	let err = OAuth2Endpoint::default()
		.request_token(request(&server, ClientAuthMethod::ClientSecretBasic))
		.await
		.expect_err("Rejected credentials should surface as an error.");

	mock.assert_async().await;

	match err {
		Error::AcquisitionFailed { error, description, status } => {
			assert_eq!(error, "invalid_client");
			assert_eq!(description.as_deref(), Some("Client authentication failed."));
			assert_eq!(status, Some(400));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn malformed_success_bodies_are_invalid_responses() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body("{\"unexpected\":true}");
		})
		.await;

	let err = OAuth2Endpoint::default()
		.request_token(request(&server, ClientAuthMethod::ClientSecretBasic))
		.await
		.expect_err("Malformed bodies should be rejected.");

	assert_eq!(err.oauth_error(), Some("invalid_response"));
}

#[tokio::test]
async fn refresh_grant_without_a_refresh_token_is_rejected_locally() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200);
		})
		.await;
	let mut request = request(&server, ClientAuthMethod::ClientSecretBasic);

	request.grant = GrantType::RefreshToken;

	let err = OAuth2Endpoint::default()
		.request_token(request)
		.await
		.expect_err("Missing refresh tokens must be rejected.");

	assert_eq!(err.oauth_error(), Some("invalid_request"));

	mock.assert_calls_async(0).await;
}
