//! Back-channel `client_credentials` acquisition.
//!
//! The credential is chosen per acquisition: a caller-supplied assertion wins, `private_key_jwt`
//! registrations ask the assertion provider (falling back to the secret when the provider has no
//! strategy for the owner), and the remaining methods present the secret or nothing at all.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	assertion::AssertionRequest,
	auth::{AccessToken, ClientName},
	cache::{CacheKey, OwnerKey},
	client::{ClientAuthMethod, ClientDescriptor},
	endpoint::{ClientCredential, GrantType, TokenEndpointRequest},
	error::{AssertionError, ConfigError},
	manager::{ManagerInner, ResolvedRequest, TokenManager, TokenRequestParameters},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenManager {
	pub(super) async fn client_token(
		&self,
		name: &ClientName,
		params: &TokenRequestParameters,
		cancel: Option<&CancellationToken>,
	) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "client_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let descriptor = self.inner.client_descriptor(name)?;
				let request = ResolvedRequest::merge(&descriptor, params)?;
				let key = CacheKey::new(
					OwnerKey::Client(descriptor.name.clone()),
					request.scope.clone(),
					request.resource.clone(),
					request.parameters.clone(),
				);
				let inner = self.inner.clone();
				let params = params.clone();

				self.inner
					.cache
					.resolve_with_cancellation(&key, params.force_renewal, cancel, move || {
						obs::record_flow_outcome(KIND, FlowOutcome::Acquire);

						async move {
							inner.acquire_client_token(&descriptor, request, params).await
						}
					})
					.await
			})
			.await;

		obs::record_result(KIND, &result, AccessToken::is_empty);

		result
	}
}

impl ManagerInner {
	async fn acquire_client_token(
		&self,
		descriptor: &ClientDescriptor,
		request: ResolvedRequest,
		params: TokenRequestParameters,
	) -> Result<AccessToken> {
		let credential = self.client_credential(descriptor, &params).await?;
		let response = self
			.endpoint
			.request_token(TokenEndpointRequest {
				grant: GrantType::ClientCredentials,
				address: descriptor.token_endpoint.clone(),
				client_id: descriptor.client_id.clone(),
				auth_method: descriptor.auth_method,
				credential,
				scope: request.scope.clone(),
				resource: request.resource,
				parameters: request.parameters,
				refresh_token: None,
				context: params.context,
			})
			.await?;

		Ok(self.token_from_response(&response, request.scope.as_ref()))
	}

	pub(super) async fn client_credential(
		&self,
		descriptor: &ClientDescriptor,
		params: &TokenRequestParameters,
	) -> Result<ClientCredential> {
		if let Some(assertion) = &params.assertion {
			return Ok(ClientCredential::Assertion(assertion.clone()));
		}

		let secret = descriptor
			.client_secret
			.as_ref()
			.filter(|secret| !secret.is_blank())
			.cloned()
			.map(ClientCredential::Secret);

		match descriptor.auth_method {
			ClientAuthMethod::PrivateKeyJwt => {
				let assertion = self
					.assertions
					.client_assertion(AssertionRequest {
						client_name: &descriptor.name,
						client_id: &descriptor.client_id,
						endpoint: &descriptor.token_endpoint,
						configuration_scheme: descriptor.configuration_scheme.as_ref(),
						context: &params.context,
					})
					.await?;

				match (assertion, secret) {
					(Some(assertion), _) => Ok(ClientCredential::Assertion(assertion)),
					(None, Some(secret)) => Ok(secret),
					(None, None) => Err(AssertionError::Unavailable {
						owner: descriptor.name.to_string(),
						reason: "no assertion strategy is registered and no secret is configured"
							.into(),
					}
					.into()),
				}
			},
			ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost => secret
				.ok_or_else(|| {
					ConfigError::MissingClientSecret { client: descriptor.name.to_string() }.into()
				}),
			ClientAuthMethod::None => Ok(ClientCredential::None),
		}
	}
}
