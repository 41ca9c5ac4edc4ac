// self
use crate::{
	_prelude::*,
	auth::{ClientName, SchemeName, ScopeSet, TokenSecret},
	client::{ClientAuthMethod, ClientDescriptor},
};

/// Form fields the manager owns; registrations cannot override them through `parameters`.
const RESERVED_PARAMETERS: &[&str] = &[
	"grant_type",
	"client_id",
	"client_secret",
	"client_assertion",
	"client_assertion_type",
	"scope",
	"resource",
	"refresh_token",
];

/// Errors raised while constructing or validating client descriptors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ClientDescriptorError {
	/// Token endpoint is mandatory.
	#[error("Client `{client}` is missing a token endpoint.")]
	MissingTokenEndpoint {
		/// Registration name.
		client: String,
	},
	/// Client identifier is mandatory.
	#[error("Client `{client}` is missing a client_id.")]
	MissingClientId {
		/// Registration name.
		client: String,
	},
	/// The selected auth method needs a secret.
	#[error("Client `{client}` uses {method:?} but has no client secret.")]
	MissingClientSecret {
		/// Registration name.
		client: String,
		/// Configured auth method.
		method: ClientAuthMethod,
	},
	/// Token endpoints must use HTTPS unless they point at a loopback host.
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Extra parameters cannot shadow protocol fields.
	#[error("Parameter `{name}` is reserved for the token request.")]
	ReservedParameter {
		/// Offending parameter name.
		name: String,
	},
}

/// Builder for [`ClientDescriptor`] values; also the serde shape of a descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientDescriptorBuilder {
	/// Registration name.
	pub name: ClientName,
	/// Token endpoint address.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// OAuth client identifier.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Shared secret for `client_secret_*` methods.
	#[serde(default)]
	pub client_secret: Option<TokenSecret>,
	/// Client authentication method.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
	/// Default scope.
	#[serde(default)]
	pub scope: Option<ScopeSet>,
	/// Default resource indicator.
	#[serde(default)]
	pub resource: Option<String>,
	/// Extra form parameters.
	#[serde(default)]
	pub parameters: BTreeMap<String, String>,
	/// Scheme consulted by the assertion provider.
	#[serde(default)]
	pub configuration_scheme: Option<SchemeName>,
}
impl ClientDescriptorBuilder {
	/// Creates a new builder seeded with the registration name.
	pub fn new(name: ClientName) -> Self {
		Self {
			name,
			token_endpoint: None,
			client_id: None,
			client_secret: None,
			auth_method: ClientAuthMethod::default(),
			scope: None,
			resource: None,
			parameters: BTreeMap::new(),
			configuration_scheme: None,
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<TokenSecret>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the client authentication method.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Sets the default scope.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Sets the default resource indicator.
	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());

		self
	}

	/// Adds an extra form parameter.
	pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.parameters.insert(name.into(), value.into());

		self
	}

	/// Sets the configuration scheme used for assertion lookup.
	pub fn configuration_scheme(mut self, scheme: SchemeName) -> Self {
		self.configuration_scheme = Some(scheme);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ClientDescriptor, ClientDescriptorError> {
		let client = self.name.to_string();
		let token_endpoint = self
			.token_endpoint
			.ok_or_else(|| ClientDescriptorError::MissingTokenEndpoint { client: client.clone() })?;
		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or_else(|| ClientDescriptorError::MissingClientId { client: client.clone() })?;

		validate_endpoint(&token_endpoint)?;

		if self.auth_method.requires_secret()
			&& self.client_secret.as_ref().is_none_or(TokenSecret::is_blank)
		{
			return Err(ClientDescriptorError::MissingClientSecret {
				client,
				method: self.auth_method,
			});
		}

		check_parameters(&self.parameters)?;

		Ok(ClientDescriptor {
			name: self.name,
			token_endpoint,
			client_id,
			client_secret: self.client_secret,
			auth_method: self.auth_method,
			scope: self.scope,
			resource: self.resource,
			parameters: self.parameters,
			configuration_scheme: self.configuration_scheme,
		})
	}
}
impl TryFrom<ClientDescriptorBuilder> for ClientDescriptor {
	type Error = ClientDescriptorError;

	fn try_from(builder: ClientDescriptorBuilder) -> Result<Self, Self::Error> {
		builder.build()
	}
}
impl From<ClientDescriptor> for ClientDescriptorBuilder {
	fn from(descriptor: ClientDescriptor) -> Self {
		Self {
			name: descriptor.name,
			token_endpoint: Some(descriptor.token_endpoint),
			client_id: Some(descriptor.client_id),
			client_secret: descriptor.client_secret,
			auth_method: descriptor.auth_method,
			scope: descriptor.scope,
			resource: descriptor.resource,
			parameters: descriptor.parameters,
			configuration_scheme: descriptor.configuration_scheme,
		}
	}
}

/// Rejects extra parameters that would shadow protocol fields.
pub(crate) fn check_parameters(
	parameters: &BTreeMap<String, String>,
) -> Result<(), ClientDescriptorError> {
	match parameters.keys().find(|name| RESERVED_PARAMETERS.contains(&name.as_str())) {
		Some(name) => Err(ClientDescriptorError::ReservedParameter { name: name.clone() }),
		None => Ok(()),
	}
}

fn validate_endpoint(url: &Url) -> Result<(), ClientDescriptorError> {
	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ClientDescriptorError::InsecureEndpoint { url: url.to_string() })
	}
}
