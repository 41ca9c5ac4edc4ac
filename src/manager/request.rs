// self
use crate::{
	_prelude::*,
	assertion::ClientAssertion,
	auth::{ClientName, SchemeName, ScopeSet, SubjectId},
	client::{ClientDescriptor, check_parameters},
	error::ConfigError,
};

/// Signed-in user whose delegated tokens are requested.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserContext {
	/// User identity.
	pub subject: SubjectId,
	/// Authentication scheme the user signed in with.
	pub scheme: Option<SchemeName>,
}
impl UserContext {
	/// Creates a context without a scheme.
	pub fn new(subject: SubjectId) -> Self {
		Self { subject, scheme: None }
	}

	/// Sets the authentication scheme.
	pub fn with_scheme(mut self, scheme: SchemeName) -> Self {
		self.scheme = Some(scheme);

		self
	}
}

/// Identity a token is requested for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenOwner {
	/// Back-channel client registration.
	Client(ClientName),
	/// Delegated user.
	User(UserContext),
}
impl From<ClientName> for TokenOwner {
	fn from(name: ClientName) -> Self {
		Self::Client(name)
	}
}
impl From<UserContext> for TokenOwner {
	fn from(context: UserContext) -> Self {
		Self::User(context)
	}
}
impl Display for TokenOwner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			TokenOwner::Client(name) => write!(f, "client:{name}"),
			TokenOwner::User(context) => write!(f, "user:{}", context.subject),
		}
	}
}

/// Per-call options for
/// [`TokenManager::get_access_token`](crate::manager::TokenManager::get_access_token).
///
/// Values are never mutated once handed to the manager; derive a new value with the `with_*`
/// methods instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenRequestParameters {
	/// Bypass the cache and session token and renew.
	pub force_renewal: bool,
	/// Scope override.
	pub scope: Option<ScopeSet>,
	/// Resource indicator override.
	pub resource: Option<String>,
	/// Extra form parameters merged over the registration's own.
	pub parameters: BTreeMap<String, String>,
	/// Pre-built client assertion; skips the assertion provider.
	pub assertion: Option<ClientAssertion>,
	/// Opaque context forwarded to the assertion provider and token endpoint.
	pub context: BTreeMap<String, String>,
	/// Authentication scheme override for user owners.
	pub challenge_scheme: Option<SchemeName>,
}
impl TokenRequestParameters {
	/// Creates default parameters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the force-renewal flag.
	pub fn with_force_renewal(mut self, force_renewal: bool) -> Self {
		self.force_renewal = force_renewal;

		self
	}

	/// Sets the scope override.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Sets the resource override.
	pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());

		self
	}

	/// Adds an extra form parameter.
	pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.parameters.insert(name.into(), value.into());

		self
	}

	/// Supplies a client assertion.
	pub fn with_assertion(mut self, assertion: ClientAssertion) -> Self {
		self.assertion = Some(assertion);

		self
	}

	/// Adds an opaque context value.
	pub fn with_context(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.context.insert(name.into(), value.into());

		self
	}

	/// Sets the challenge scheme override.
	pub fn with_challenge_scheme(mut self, scheme: SchemeName) -> Self {
		self.challenge_scheme = Some(scheme);

		self
	}

	/// Returns `true` when the caller asks for the registration's default request shape.
	pub fn is_default_shape(&self) -> bool {
		self.scope.is_none() && self.resource.is_none()
	}
}

/// Request shape after merging registration defaults with per-call overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedRequest {
	pub(crate) scope: Option<ScopeSet>,
	pub(crate) resource: Option<String>,
	pub(crate) parameters: BTreeMap<String, String>,
}
impl ResolvedRequest {
	pub(crate) fn merge(
		descriptor: &ClientDescriptor,
		params: &TokenRequestParameters,
	) -> Result<Self> {
		check_parameters(&params.parameters).map_err(ConfigError::from)?;

		let mut parameters = descriptor.parameters.clone();

		parameters.extend(params.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));

		Ok(Self {
			scope: params.scope.clone().or_else(|| descriptor.scope.clone()),
			resource: params.resource.clone().or_else(|| descriptor.resource.clone()),
			parameters,
		})
	}
}
