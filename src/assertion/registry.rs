//! Per-client and per-scheme assertion strategies.

// self
use crate::{
	_prelude::*,
	assertion::{AssertionFuture, AssertionRequest, ClientAssertionService, PrivateKeyJwt},
	auth::{ClientName, SchemeName},
};

/// How assertions are produced for one registration.
#[derive(Clone, Debug)]
pub enum AssertionStrategy {
	/// Never produce an assertion; the client secret is used instead.
	None,
	/// Sign an RFC 7523 JWT.
	PrivateKeyJwt(PrivateKeyJwt),
}

/// Assertion provider that looks up a strategy per configuration scheme or client name.
///
/// The configuration scheme wins when the request carries one and a strategy is registered for
/// it. Owners with no registered strategy get `None`.
#[derive(Clone, Debug, Default)]
pub struct AssertionRegistry {
	by_scheme: HashMap<SchemeName, AssertionStrategy>,
	by_client: HashMap<ClientName, AssertionStrategy>,
}
impl AssertionRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a strategy for a configuration scheme.
	pub fn with_scheme(mut self, scheme: SchemeName, strategy: AssertionStrategy) -> Self {
		self.by_scheme.insert(scheme, strategy);

		self
	}

	/// Registers a strategy for a client registration name.
	pub fn with_client(mut self, client: ClientName, strategy: AssertionStrategy) -> Self {
		self.by_client.insert(client, strategy);

		self
	}

	/// Returns the strategy that applies to the request, if any.
	pub fn strategy_for(&self, request: &AssertionRequest<'_>) -> Option<&AssertionStrategy> {
		request
			.configuration_scheme
			.and_then(|scheme| self.by_scheme.get(scheme))
			.or_else(|| self.by_client.get(request.client_name))
	}
}
impl ClientAssertionService for AssertionRegistry {
	fn client_assertion<'a>(&'a self, request: AssertionRequest<'a>) -> AssertionFuture<'a> {
		Box::pin(async move {
			match self.strategy_for(&request) {
				Some(AssertionStrategy::PrivateKeyJwt(jwt)) => jwt.assert(request).await.map(Some),
				Some(AssertionStrategy::None) | None => Ok(None),
			}
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::assertion::{AssertionSigner, SignFuture};

	struct FixedSigner;
	impl AssertionSigner for FixedSigner {
		fn algorithm(&self) -> &str {
			"PS256"
		}

		fn sign<'a>(&'a self, _: &'a [u8]) -> SignFuture<'a> {
			Box::pin(async { Ok(vec![1, 2, 3]) })
		}
	}

	#[test]
	fn scheme_takes_precedence_and_unknown_owners_fall_back() {
		let billing = ClientName::new("billing").expect("Client name should be valid.");
		let payroll = ClientName::new("payroll").expect("Client name should be valid.");
		let partner = SchemeName::new("partner").expect("Scheme name should be valid.");
		let registry = AssertionRegistry::new()
			.with_client(billing.clone(), AssertionStrategy::None)
			.with_scheme(
				partner.clone(),
				AssertionStrategy::PrivateKeyJwt(PrivateKeyJwt::new(Arc::new(FixedSigner))),
			);
		let endpoint = Url::parse("https://idp.example.com/token").expect("URL should parse.");
		let context = BTreeMap::new();
		let lookup = |client_name: &ClientName, configuration_scheme: Option<&SchemeName>| {
			futures::executor::block_on(registry.client_assertion(AssertionRequest {
				client_name,
				client_id: "client",
				endpoint: &endpoint,
				configuration_scheme,
				context: &context,
			}))
			.expect("Assertion lookup should succeed.")
		};

		assert!(lookup(&billing, Some(&partner)).is_some());
		assert!(lookup(&billing, None).is_none());

		let unknown = lookup(&payroll, None);

		assert!(unknown.is_none());
	}
}
