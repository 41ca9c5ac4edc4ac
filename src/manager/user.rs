//! Delegated user tokens backed by the authentication session.
//!
//! The session is the source of truth for a user's refresh token. A still-fresh session access
//! token is served as-is for the default request shape; anything else (forced renewal, a scope
//! or resource override, an expired token) goes through the `refresh_token` grant, after which
//! rotated values are written back to the session.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	cache::{CacheKey, OwnerKey},
	client::ClientDescriptor,
	endpoint::{GrantType, TokenEndpointRequest},
	manager::{ManagerInner, ResolvedRequest, TokenManager, TokenRequestParameters, UserContext},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{SessionKey, UserTokens},
};

impl TokenManager {
	pub(super) async fn user_token(
		&self,
		user: &UserContext,
		params: &TokenRequestParameters,
		cancel: Option<&CancellationToken>,
	) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::UserRefresh;

		let span = FlowSpan::new(KIND, "user_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let scheme = self.inner.effective_scheme(params.challenge_scheme.as_ref(), user);
				let descriptor = self.inner.user_descriptor(scheme.as_ref())?;
				let request = ResolvedRequest::merge(&descriptor, params)?;
				let key = CacheKey::new(
					OwnerKey::User { subject: user.subject.clone(), scheme: scheme.clone() },
					request.scope.clone(),
					request.resource.clone(),
					request.parameters.clone(),
				);
				let session = SessionKey::new(user.subject.clone(), scheme);
				let inner = self.inner.clone();
				let params = params.clone();

				self.inner
					.cache
					.resolve_with_cancellation(&key, params.force_renewal, cancel, move || {
						obs::record_flow_outcome(KIND, FlowOutcome::Acquire);

						async move {
							inner.acquire_user_token(&descriptor, session, request, params).await
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
	async fn acquire_user_token(
		&self,
		descriptor: &ClientDescriptor,
		session: SessionKey,
		request: ResolvedRequest,
		params: TokenRequestParameters,
	) -> Result<AccessToken> {
		let default_shape = params.is_default_shape();
		let Some(stored) = self.sessions.load(&session).await? else {
			return Ok(AccessToken::empty());
		};

		if !params.force_renewal
			&& default_shape
			&& stored.access_token.is_fresh_at(self.clock.now(), self.options.clock_skew)
		{
			return Ok(stored.access_token);
		}

		let Some(refresh_token) = stored.usable_refresh_token().cloned() else {
			return Ok(AccessToken::empty());
		};
		let credential = self.client_credential(descriptor, &params).await?;
		let response = self
			.endpoint
			.request_token(TokenEndpointRequest {
				grant: GrantType::RefreshToken,
				address: descriptor.token_endpoint.clone(),
				client_id: descriptor.client_id.clone(),
				auth_method: descriptor.auth_method,
				credential,
				scope: request.scope.clone(),
				resource: request.resource,
				parameters: request.parameters,
				refresh_token: Some(refresh_token),
				context: params.context,
			})
			.await?;
		let token = self.token_from_response(&response, request.scope.as_ref());
		let rotated = response.refresh_token.filter(|rotated| !rotated.is_blank());
		let write_access = default_shape && !token.is_empty();

		if write_access || rotated.is_some() {
			let updated = UserTokens {
				access_token: if write_access { token.clone() } else { stored.access_token },
				refresh_token: rotated.or(stored.refresh_token),
			};

			self.sessions.store(session, updated).await?;
		}

		Ok(token)
	}
}
