//! RFC 7523 `private_key_jwt` assertions.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	assertion::{AssertionRequest, ClientAssertion},
	clock::{Clock, SystemClock},
	error::AssertionError,
};

/// Boxed future returned by [`AssertionSigner::sign`].
pub type SignFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Vec<u8>, AssertionError>> + 'a + Send>>;

/// Key holder that signs assertion payloads.
///
/// Implementations wrap whatever holds the private key (an in-process key, an HSM, a cloud KMS).
/// The JWT layer only hands over the `header.claims` signing input and expects the raw signature
/// bytes back.
pub trait AssertionSigner
where
	Self: Send + Sync,
{
	/// JWS algorithm name written to the `alg` header (for example `RS256`).
	fn algorithm(&self) -> &str;

	/// Key identifier written to the `kid` header.
	fn key_id(&self) -> Option<&str> {
		None
	}

	/// Signs the JWS signing input.
	fn sign<'a>(&'a self, signing_input: &'a [u8]) -> SignFuture<'a>;
}

/// Builds signed client-authentication JWTs.
#[derive(Clone)]
pub struct PrivateKeyJwt {
	signer: Arc<dyn AssertionSigner>,
	clock: Arc<dyn Clock>,
	lifetime: Duration,
}
impl PrivateKeyJwt {
	/// Default assertion lifetime.
	pub const DEFAULT_LIFETIME: Duration = Duration::minutes(5);

	/// Creates a builder around the provided signer.
	pub fn new(signer: Arc<dyn AssertionSigner>) -> Self {
		Self { signer, clock: Arc::new(SystemClock), lifetime: Self::DEFAULT_LIFETIME }
	}

	/// Overrides the assertion lifetime.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	/// Overrides the clock used for `iat`/`exp`.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Builds and signs an assertion for the request.
	pub async fn assert(&self, request: AssertionRequest<'_>) -> Result<ClientAssertion> {
		let issued_at = self.clock.now();
		let header =
			JwtHeader { alg: self.signer.algorithm(), typ: "JWT", kid: self.signer.key_id() };
		let claims = JwtClaims {
			iss: request.client_id,
			sub: request.client_id,
			aud: request.endpoint.as_str(),
			jti: jti(),
			iat: issued_at.unix_timestamp(),
			exp: (issued_at + self.lifetime).unix_timestamp(),
		};
		let signing_input = format!(
			"{}.{}",
			URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).map_err(AssertionError::from)?),
			URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(AssertionError::from)?),
		);
		let signature = self.signer.sign(signing_input.as_bytes()).await?;

		if signature.is_empty() {
			let reason = "signer returned an empty signature".into();

			return Err(AssertionError::Signing { reason }.into());
		}

		Ok(ClientAssertion::jwt_bearer(format!(
			"{signing_input}.{}",
			URL_SAFE_NO_PAD.encode(signature)
		)))
	}
}
impl Debug for PrivateKeyJwt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PrivateKeyJwt")
			.field("algorithm", &self.signer.algorithm())
			.field("key_id", &self.signer.key_id())
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

#[derive(Serialize)]
struct JwtHeader<'a> {
	alg: &'a str,
	typ: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	kid: Option<&'a str>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
	iss: &'a str,
	sub: &'a str,
	aud: &'a str,
	jti: String,
	iat: i64,
	exp: i64,
}

fn jti() -> String {
	rand::rng().sample_iter(Alphanumeric).take(32).map(char::from).collect()
}
