//! Default [`TokenEndpoint`] built on the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	client::ClientAuthMethod,
	endpoint::{
		ClientCredential, EndpointFuture, GrantType, TokenEndpoint, TokenEndpointRequest,
		TokenEndpointResponse,
	},
	error::{ConfigError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into manager [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_: GrantType,
		_: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() =>
				ConfigError::http_request(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::http_request(inner).into(),
			HttpClientError::Io(inner) => TransportError::from(inner).into(),
			HttpClientError::Other(message) => TransportError::network(std::io::Error::other(
				format!("HTTP client error occurred while calling the token endpoint: {message}."),
			))
			.into(),
			_ => TransportError::network(std::io::Error::other(
				"HTTP client error occurred while calling the token endpoint.",
			))
			.into(),
		}
	}
}

/// Token endpoint adapter speaking RFC 6749 through the `oauth2` crate.
pub struct OAuth2Endpoint<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> OAuth2Endpoint<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an adapter over a custom transport and error mapper.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), error_mapper: error_mapper.into() }
	}

	async fn exchange(&self, request: TokenEndpointRequest) -> Result<TokenEndpointResponse> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let oauth_client = configure_client(&request)?;
		let form = extra_form_fields(&request);
		let grant = request.grant;
		let response = match grant {
			GrantType::ClientCredentials => {
				let mut exchange = oauth_client.exchange_client_credentials();

				for scope in request.scope.iter().flatten() {
					exchange = exchange.add_scope(Scope::new(scope.to_owned()));
				}
				for (name, value) in &form {
					exchange = exchange.add_extra_param(name.as_str(), value.as_str());
				}

				exchange.request_async(&handle).await
			},
			GrantType::RefreshToken => {
				let refresh_token = request
					.refresh_token
					.as_ref()
					.filter(|token| !token.is_blank())
					.map(|token| RefreshToken::new(token.expose().to_owned()))
					.ok_or_else(|| Error::AcquisitionFailed {
						error: "invalid_request".into(),
						description: Some("no refresh token was supplied".into()),
						status: None,
					})?;
				let mut exchange = oauth_client.exchange_refresh_token(&refresh_token);

				for scope in request.scope.iter().flatten() {
					exchange = exchange.add_scope(Scope::new(scope.to_owned()));
				}
				for (name, value) in &form {
					exchange = exchange.add_extra_param(name.as_str(), value.as_str());
				}

				exchange.request_async(&handle).await
			},
		}
		.map_err(|err| map_request_error(grant, meta.take(), err, self.error_mapper.as_ref()))?;

		map_token_response(response)
	}
}
impl OAuth2Endpoint {
	/// Creates a reqwest-backed adapter around an existing client.
	pub fn reqwest(client: ReqwestClient) -> Self {
		Self::new(ReqwestHttpClient::with_client(client), ReqwestTransportErrorMapper)
	}
}
impl Default for OAuth2Endpoint {
	fn default() -> Self {
		Self::reqwest(ReqwestClient::default())
	}
}
impl<C, M> TokenEndpoint for OAuth2Endpoint<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn request_token(
		&self,
		request: TokenEndpointRequest,
	) -> EndpointFuture<'_, TokenEndpointResponse> {
		Box::pin(self.exchange(request))
	}
}
impl<C, M> Debug for OAuth2Endpoint<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OAuth2Endpoint(..)")
	}
}

fn configure_client(request: &TokenEndpointRequest) -> Result<ConfiguredBasicClient> {
	let token_url = TokenUrl::new(request.address.to_string())
		.map_err(|source| ConfigError::InvalidEndpoint { source })?;
	let oauth_client =
		BasicClient::new(ClientId::new(request.client_id.clone())).set_token_uri(token_url);

	Ok(match &request.credential {
		ClientCredential::Secret(secret) => {
			let oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));

			if matches!(request.auth_method, ClientAuthMethod::ClientSecretBasic) {
				oauth_client
			} else {
				oauth_client.set_auth_type(AuthType::RequestBody)
			}
		},
		ClientCredential::Assertion(_) | ClientCredential::None =>
			oauth_client.set_auth_type(AuthType::RequestBody),
	})
}

fn extra_form_fields(request: &TokenEndpointRequest) -> Vec<(String, String)> {
	let mut form =
		request.parameters.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>();

	if let ClientCredential::Assertion(assertion) = &request.credential {
		form.push(("client_assertion_type".into(), assertion.assertion_type.clone()));
		form.push(("client_assertion".into(), assertion.value.expose().to_owned()));
	}
	if let Some(resource) = &request.resource {
		form.push(("resource".into(), resource.clone()));
	}

	form
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenEndpointResponse> {
	let expires_in = response
		.expires_in()
		.map(|lifetime| {
			i64::try_from(lifetime.as_secs())
				.map(Duration::seconds)
				.map_err(|_| ConfigError::ExpiresInOutOfRange)
		})
		.transpose()?;
	let scope = response
		.scopes()
		.map(|scopes| ScopeSet::new(scopes.iter().map(|scope| scope.as_str())))
		.transpose()
		.map_err(ConfigError::from)?;

	Ok(TokenEndpointResponse {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		expires_in,
		scope,
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
	})
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => Error::AcquisitionFailed {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
			status,
		},
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(grant, meta.as_ref(), error),
		RequestTokenError::Parse(error, _) => Error::AcquisitionFailed {
			error: "invalid_response".into(),
			description: Some(format!("token response could not be parsed: {error}")),
			status,
		},
		RequestTokenError::Other(message) => Error::AcquisitionFailed {
			error: "unexpected_response".into(),
			description: Some(message),
			status,
		},
	}
}
