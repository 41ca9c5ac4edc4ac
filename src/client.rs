//! Client registrations (data) and manager-wide options.
//!
//! A [`ClientDescriptor`] is everything the manager needs to obtain tokens for one logical owner:
//! the token endpoint, the client credentials, how to authenticate, and the default request
//! shape (scope, resource, extra parameters). Descriptors are validated when built or
//! deserialized, so the acquisition path never has to second-guess them.

/// Builder API and validation for client descriptors.
pub mod builder;
/// Manager-wide tunables.
pub mod options;

pub use builder::*;
pub use options::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientName, SchemeName, ScopeSet, TokenSecret},
};

/// How the client authenticates against the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Signed JWT produced by the assertion provider (RFC 7523).
	PrivateKeyJwt,
	/// Public client; only `client_id` is sent.
	None,
}
impl ClientAuthMethod {
	/// Returns `true` for methods that need a configured client secret.
	pub fn requires_secret(self) -> bool {
		matches!(self, Self::ClientSecretBasic | Self::ClientSecretPost)
	}
}

/// Validated client registration consumed by the manager.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClientDescriptorBuilder")]
pub struct ClientDescriptor {
	/// Registration name used as the cache owner for back-channel tokens.
	pub name: ClientName,
	/// Token endpoint address.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// Shared secret for `client_secret_*` methods.
	pub client_secret: Option<TokenSecret>,
	/// Client authentication method.
	pub auth_method: ClientAuthMethod,
	/// Default scope requested when the caller does not supply one.
	pub scope: Option<ScopeSet>,
	/// Default resource indicator (RFC 8707).
	pub resource: Option<String>,
	/// Extra form parameters sent with every token request.
	pub parameters: BTreeMap<String, String>,
	/// Scheme consulted by the assertion provider instead of the client name.
	pub configuration_scheme: Option<SchemeName>,
}
impl ClientDescriptor {
	/// Creates a new builder for the provided registration name.
	pub fn builder(name: ClientName) -> ClientDescriptorBuilder {
		ClientDescriptorBuilder::new(name)
	}
}
impl Debug for ClientDescriptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientDescriptor")
			.field("name", &self.name)
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("auth_method", &self.auth_method)
			.field("scope", &self.scope)
			.field("resource", &self.resource)
			.field("parameters", &self.parameters)
			.field("configuration_scheme", &self.configuration_scheme)
			.finish()
	}
}
