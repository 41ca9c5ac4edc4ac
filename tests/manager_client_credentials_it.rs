mod common;

// std
use std::sync::Arc;
// crates.io
use time::Duration;
use tokio_util::sync::CancellationToken;
// self
use common::*;
use oauth2_token_manager::{
	assertion::{
		AssertionRegistry, AssertionSigner, AssertionStrategy, ClientAssertion,
		JWT_BEARER_ASSERTION_TYPE, PrivateKeyJwt, SignFuture,
	},
	client::{ClientAuthMethod, ClientDescriptor},
	clock::ManualClock,
	endpoint::{ClientCredential, GrantType, TokenEndpointResponse},
	error::{AssertionError, ConfigError, Error, TransportError},
	manager::{TokenManager, TokenOwner, TokenRequestParameters},
	url::Url,
};

const TOKEN_URL: &str = "https://idp.example.com/oauth2/token";

fn build(endpoint: &ScriptedEndpoint) -> (TokenManager, TokenOwner, ManualClock) {
	let clock = clock();
	let manager = TokenManager::builder(endpoint.clone())
		.clock(Arc::new(clock.clone()))
		.client(descriptor("billing", TOKEN_URL))
		.build();

	(manager, TokenOwner::Client(client_name("billing")), clock)
}

#[tokio::test]
async fn fresh_token_is_served_from_cache() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);
	let params = TokenRequestParameters::default();
	let first =
		manager.get_access_token(&owner, &params).await.expect("First call should succeed.");
	let second =
		manager.get_access_token(&owner, &params).await.expect("Second call should succeed.");

	assert_eq!(first.value.expose(), "token-1");
	assert_eq!(second.value.expose(), "token-1");
	assert_eq!(endpoint.calls(), 1);
	assert_eq!(manager.cache_metrics().hits(), 1);

	let request = &endpoint.requests()[0];

	assert_eq!(request.grant, GrantType::ClientCredentials);
	assert_eq!(request.client_id, "billing-client");
	assert!(matches!(
		&request.credential,
		ClientCredential::Secret(secret) if secret.expose() == "billing-secret"
	));
}

#[tokio::test]
async fn concurrent_callers_share_one_acquisition() {
	let endpoint = ScriptedEndpoint::default().with_delay(std::time::Duration::from_millis(50));
	let (manager, owner, _) = build(&endpoint);
	let handles = (0..8)
		.map(|_| {
			let manager = manager.clone();
			let owner = owner.clone();

			tokio::spawn(async move {
				manager.get_access_token(&owner, &TokenRequestParameters::default()).await
			})
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Task should not panic.")
			.expect("Every caller should receive the shared token.");

		assert_eq!(token.value.expose(), "token-1");
	}

	assert_eq!(endpoint.calls(), 1);
	assert_eq!(manager.cache_metrics().acquisitions(), 1);
}

#[tokio::test]
async fn forced_renewal_replaces_the_cached_token() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);
	let params = TokenRequestParameters::default();

	manager.get_access_token(&owner, &params).await.expect("Initial call should succeed.");

	let renewed = manager
		.get_access_token(&owner, &params.clone().with_force_renewal(true))
		.await
		.expect("Forced renewal should succeed.");
	let cached =
		manager.get_access_token(&owner, &params).await.expect("Follow-up call should succeed.");

	assert_eq!(renewed.value.expose(), "token-2");
	assert_eq!(cached.value.expose(), "token-2");
	assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn expired_token_is_renewed_within_clock_skew() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, clock) = build(&endpoint);
	let params = TokenRequestParameters::default();

	manager.get_access_token(&owner, &params).await.expect("Initial call should succeed.");
	// One hour lifetime, 60 second default skew.
	clock.advance(Duration::minutes(59));

	let token = manager.get_access_token(&owner, &params).await.expect("Renewal should succeed.");

	assert_eq!(token.value.expose(), "token-2");
	assert_eq!(token.expires_at, EPOCH + Duration::minutes(119));
}

#[tokio::test]
async fn scopes_are_cached_independently() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);
	let read = TokenRequestParameters::new()
		.with_scope("invoices.read".parse().expect("Scope should parse."));
	let write = TokenRequestParameters::new()
		.with_scope("invoices.write".parse().expect("Scope should parse."));
	let read_token = manager.get_access_token(&owner, &read).await.expect("Read should succeed.");
	let write_token =
		manager.get_access_token(&owner, &write).await.expect("Write should succeed.");
	let read_again =
		manager.get_access_token(&owner, &read).await.expect("Cached read should succeed.");

	assert_ne!(read_token.value.expose(), write_token.value.expose());
	assert_eq!(read_again.value.expose(), read_token.value.expose());
	assert_eq!(endpoint.calls(), 2);
	assert_eq!(
		endpoint.requests()[1].scope.as_ref().map(|scope| scope.normalized()).as_deref(),
		Some("invoices.write")
	);
}

#[tokio::test]
async fn failure_reaches_every_waiter_and_keeps_the_stale_entry() {
	let endpoint = ScriptedEndpoint::default().with_delay(std::time::Duration::from_millis(30));
	let (manager, owner, _) = build(&endpoint);
	let params = TokenRequestParameters::default();
	let forced = params.clone().with_force_renewal(true);

	manager.get_access_token(&owner, &params).await.expect("Initial call should succeed.");
	endpoint.push_error(TransportError::Timeout.into());

	let (left, right) = tokio::join!(
		manager.get_access_token(&owner, &forced),
		manager.get_access_token(&owner, &forced),
	);

	assert!(matches!(left, Err(Error::Transport(TransportError::Timeout))));
	assert!(matches!(right, Err(Error::Transport(TransportError::Timeout))));
	assert_eq!(endpoint.calls(), 2);
	assert_eq!(manager.cache_metrics().failures(), 1);

	let stale =
		manager.get_access_token(&owner, &params).await.expect("Stale entry should be served.");

	assert_eq!(stale.value.expose(), "token-1");
	assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn cancelling_one_waiter_leaves_the_others_running() {
	let endpoint = ScriptedEndpoint::default().with_delay(std::time::Duration::from_millis(100));
	let (manager, owner, _) = build(&endpoint);
	let params = TokenRequestParameters::default();
	let cancel = CancellationToken::new();
	let (cancelled, completed, _) = tokio::join!(
		manager.get_access_token_with_cancellation(&owner, &params, &cancel),
		manager.get_access_token(&owner, &params),
		async {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			cancel.cancel();
		},
	);

	assert!(matches!(cancelled, Err(Error::Cancelled)));
	assert_eq!(completed.expect("Uncancelled waiter should succeed.").value.expose(), "token-1");
	assert_eq!(endpoint.calls(), 1);
}

#[tokio::test]
async fn missing_lifetime_falls_back_to_the_default() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);

	endpoint.push(Ok(TokenEndpointResponse::new("no-expiry")));

	let token = manager
		.get_access_token(&owner, &TokenRequestParameters::default())
		.await
		.expect("Call should succeed.");

	assert_eq!(token.value.expose(), "no-expiry");
	assert_eq!(token.expires_at, EPOCH + Duration::hours(1));
}

#[tokio::test]
async fn empty_tokens_are_returned_but_not_cached() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);
	let params = TokenRequestParameters::default();

	endpoint.push(Ok(TokenEndpointResponse::new("").with_expires_in(Duration::hours(1))));

	let empty = manager.get_access_token(&owner, &params).await.expect("Call should succeed.");
	let next = manager.get_access_token(&owner, &params).await.expect("Call should succeed.");

	assert!(empty.is_empty());
	assert_eq!(next.value.expose(), "token-2");
	assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn explicit_assertion_replaces_the_secret() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);
	let assertion = ClientAssertion::jwt_bearer("header.claims.sig");
	let params = TokenRequestParameters::new().with_assertion(assertion);

	manager.get_access_token(&owner, &params).await.expect("Call should succeed.");

	assert!(matches!(
		&endpoint.requests()[0].credential,
		ClientCredential::Assertion(assertion) if assertion.value.expose() == "header.claims.sig"
	));
}

struct StaticSigner;
impl AssertionSigner for StaticSigner {
	fn algorithm(&self) -> &str {
		"RS256"
	}

	fn sign<'a>(&'a self, _: &'a [u8]) -> SignFuture<'a> {
		Box::pin(async { Ok(b"signature".to_vec()) })
	}
}

fn ledger_descriptor() -> ClientDescriptor {
	ClientDescriptor::builder(client_name("ledger"))
		.token_endpoint(Url::parse(TOKEN_URL).expect("Token endpoint should parse."))
		.client_id("ledger-client")
		.auth_method(ClientAuthMethod::PrivateKeyJwt)
		.build()
		.expect("Descriptor should build without a secret.")
}

#[tokio::test]
async fn private_key_jwt_clients_present_a_signed_assertion() {
	let endpoint = ScriptedEndpoint::default();
	let strategy = AssertionStrategy::PrivateKeyJwt(PrivateKeyJwt::new(Arc::new(StaticSigner)));
	let manager = TokenManager::builder(endpoint.clone())
		.assertions(Arc::new(AssertionRegistry::new().with_client(client_name("ledger"), strategy)))
		.client(ledger_descriptor())
		.build();

	manager
		.get_access_token(
			&TokenOwner::Client(client_name("ledger")),
			&TokenRequestParameters::default(),
		)
		.await
		.expect("Assertion-authenticated call should succeed.");

	match &endpoint.requests()[0].credential {
		ClientCredential::Assertion(assertion) => {
			assert_eq!(assertion.assertion_type, JWT_BEARER_ASSERTION_TYPE);
			assert_eq!(assertion.value.expose().split('.').count(), 3);
		},
		other => panic!("Unexpected credential: {other:?}."),
	}
}

#[tokio::test]
async fn private_key_jwt_without_strategy_or_secret_fails_before_the_round_trip() {
	let endpoint = ScriptedEndpoint::default();
	let manager = TokenManager::builder(endpoint.clone()).client(ledger_descriptor()).build();
	let err = manager
		.get_access_token(
			&TokenOwner::Client(client_name("ledger")),
			&TokenRequestParameters::default(),
		)
		.await
		.expect_err("Missing credentials must be reported.");

	assert!(matches!(err, Error::AssertionFailed(AssertionError::Unavailable { .. })));
	assert_eq!(endpoint.calls(), 0);
}

#[tokio::test]
async fn removed_client_tokens_are_acquired_again() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, owner, _) = build(&endpoint);
	let params = TokenRequestParameters::default();

	manager.get_access_token(&owner, &params).await.expect("Call should succeed.");
	manager.remove_client_token(&client_name("billing"));

	let token = manager.get_access_token(&owner, &params).await.expect("Call should succeed.");

	assert_eq!(token.value.expose(), "token-2");
}

#[tokio::test]
async fn unknown_clients_are_configuration_errors() {
	let endpoint = ScriptedEndpoint::default();
	let (manager, _, _) = build(&endpoint);
	let err = manager
		.get_access_token(
			&TokenOwner::Client(client_name("unregistered")),
			&TokenRequestParameters::default(),
		)
		.await
		.expect_err("Unknown clients must be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::UnknownClient { .. })));
	assert_eq!(endpoint.calls(), 0);
}
