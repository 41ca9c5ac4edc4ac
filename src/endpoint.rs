//! Token acquirer boundary.
//!
//! The manager resolves every input (address, credentials, scope, extra parameters) before it
//! reaches a [`TokenEndpoint`], so implementations only perform the round trip.

#[cfg(feature = "reqwest")] pub mod oauth;
#[cfg(feature = "reqwest")] pub use oauth::*;

// self
use crate::{
	_prelude::*,
	assertion::ClientAssertion,
	auth::{ScopeSet, TokenSecret},
	client::ClientAuthMethod,
};

/// Boxed future returned by [`TokenEndpoint`] implementations.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// OAuth grants the manager issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Back-channel token for the client itself.
	ClientCredentials,
	/// Delegated user token renewed from a session refresh token.
	RefreshToken,
}
impl GrantType {
	/// Returns the `grant_type` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Credential presented alongside `client_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCredential {
	/// Public client.
	None,
	/// Shared client secret.
	Secret(TokenSecret),
	/// Signed client assertion.
	Assertion(ClientAssertion),
}

/// Fully resolved token request.
#[derive(Clone, Debug)]
pub struct TokenEndpointRequest {
	/// Grant to request.
	pub grant: GrantType,
	/// Token endpoint address.
	pub address: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// How the credential is presented.
	pub auth_method: ClientAuthMethod,
	/// Credential to present.
	pub credential: ClientCredential,
	/// Requested scope.
	pub scope: Option<ScopeSet>,
	/// Resource indicator.
	pub resource: Option<String>,
	/// Extra form parameters.
	pub parameters: BTreeMap<String, String>,
	/// Refresh token for [`GrantType::RefreshToken`].
	pub refresh_token: Option<TokenSecret>,
	/// Opaque caller context; not sent on the wire by the default adapter.
	pub context: BTreeMap<String, String>,
}

/// Successful token response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenEndpointResponse {
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Lifetime reported by the endpoint.
	pub expires_in: Option<Duration>,
	/// Granted scope, when reported.
	pub scope: Option<ScopeSet>,
	/// Rotated or newly issued refresh token.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenEndpointResponse {
	/// Creates a response carrying only an access token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self {
			access_token: access_token.into(),
			expires_in: None,
			scope: None,
			refresh_token: None,
		}
	}

	/// Sets the reported lifetime.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_in = Some(expires_in);

		self
	}

	/// Sets the granted scope.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}
}

/// Performs token endpoint round trips.
pub trait TokenEndpoint
where
	Self: Send + Sync,
{
	/// Requests a token; OAuth error responses surface as [`Error::AcquisitionFailed`].
	fn request_token(
		&self,
		request: TokenEndpointRequest,
	) -> EndpointFuture<'_, TokenEndpointResponse>;
}
