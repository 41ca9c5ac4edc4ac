//! Client assertions for back-channel client authentication.
//!
//! A client that authenticates with `private_key_jwt` presents a signed, short-lived assertion
//! instead of a shared secret. The manager asks a [`ClientAssertionService`] for one right before
//! each acquisition and never caches the result.

pub mod jwt;
pub mod registry;

pub use jwt::*;
pub use registry::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientName, SchemeName, TokenSecret},
};

/// Assertion type registered for JWT client authentication (RFC 7523).
pub const JWT_BEARER_ASSERTION_TYPE: &str =
	"urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Boxed future returned by [`ClientAssertionService`] implementations.
pub type AssertionFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<ClientAssertion>>> + 'a + Send>>;

/// Signed credential presented in place of a client secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientAssertion {
	/// Value sent as `client_assertion_type`.
	pub assertion_type: String,
	/// Value sent as `client_assertion`.
	pub value: TokenSecret,
}
impl ClientAssertion {
	/// Creates a new assertion of the given type.
	pub fn new(assertion_type: impl Into<String>, value: impl Into<TokenSecret>) -> Self {
		Self { assertion_type: assertion_type.into(), value: value.into() }
	}

	/// Creates a JWT bearer assertion.
	pub fn jwt_bearer(value: impl Into<TokenSecret>) -> Self {
		Self::new(JWT_BEARER_ASSERTION_TYPE, value)
	}
}
impl Debug for ClientAssertion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientAssertion")
			.field("assertion_type", &self.assertion_type)
			.field("value", &self.value)
			.finish()
	}
}

/// Inputs available to an assertion provider for one acquisition.
#[derive(Clone, Copy, Debug)]
pub struct AssertionRequest<'a> {
	/// Registration name of the client.
	pub client_name: &'a ClientName,
	/// OAuth client identifier (the JWT issuer and subject).
	pub client_id: &'a str,
	/// Token endpoint the assertion is addressed to.
	pub endpoint: &'a Url,
	/// Configuration scheme of the registration, if any.
	pub configuration_scheme: Option<&'a SchemeName>,
	/// Opaque request context forwarded from the token parameters.
	pub context: &'a BTreeMap<String, String>,
}

/// Produces client assertions on demand.
pub trait ClientAssertionService
where
	Self: Send + Sync,
{
	/// Returns an assertion for the request, or `None` to fall back to the client secret.
	fn client_assertion<'a>(&'a self, request: AssertionRequest<'a>) -> AssertionFuture<'a>;
}

/// Provider that never produces assertions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAssertions;
impl ClientAssertionService for NoAssertions {
	fn client_assertion<'a>(&'a self, _: AssertionRequest<'a>) -> AssertionFuture<'a> {
		Box::pin(async { Ok(None) })
	}
}
