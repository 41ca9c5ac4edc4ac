//! Shared fixtures for the integration suites.

#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime, macros::datetime};
// self
use oauth2_token_manager::{
	auth::ClientName,
	client::{ClientAuthMethod, ClientDescriptor},
	clock::ManualClock,
	endpoint::{EndpointFuture, TokenEndpoint, TokenEndpointRequest, TokenEndpointResponse},
	error::{Error, Result},
	url::Url,
};

/// Fixed instant every suite starts from.
pub const EPOCH: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

pub fn clock() -> ManualClock {
	ManualClock::new(EPOCH)
}

pub fn client_name(name: &str) -> ClientName {
	ClientName::new(name).expect("Client name fixture should be valid.")
}

pub fn descriptor(name: &str, token_endpoint: &str) -> ClientDescriptor {
	ClientDescriptor::builder(client_name(name))
		.token_endpoint(Url::parse(token_endpoint).expect("Token endpoint fixture should parse."))
		.client_id(format!("{name}-client"))
		.client_secret(format!("{name}-secret"))
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.build()
		.expect("Client descriptor fixture should build.")
}

/// In-process token endpoint that answers from a script and records every request.
///
/// Responses are consumed in order; once the script runs dry every call succeeds with
/// `token-<n>`, where `n` counts calls starting at 1.
#[derive(Clone, Default)]
pub struct ScriptedEndpoint {
	inner: Arc<ScriptedInner>,
}
#[derive(Default)]
struct ScriptedInner {
	calls: AtomicUsize,
	delay: Mutex<Option<std::time::Duration>>,
	script: Mutex<Vec<Result<TokenEndpointResponse>>>,
	requests: Mutex<Vec<TokenEndpointRequest>>,
}
impl ScriptedEndpoint {
	/// Delays every response, giving concurrent callers time to pile up.
	pub fn with_delay(self, delay: std::time::Duration) -> Self {
		*self.inner.delay.lock() = Some(delay);

		self
	}

	/// Queues one response.
	pub fn push(&self, response: Result<TokenEndpointResponse>) {
		self.inner.script.lock().push(response);
	}

	/// Queues one failure.
	pub fn push_error(&self, error: Error) {
		self.push(Err(error));
	}

	pub fn calls(&self) -> usize {
		self.inner.calls.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<TokenEndpointRequest> {
		self.inner.requests.lock().clone()
	}
}
impl TokenEndpoint for ScriptedEndpoint {
	fn request_token(
		&self,
		request: TokenEndpointRequest,
	) -> EndpointFuture<'_, TokenEndpointResponse> {
		let n = self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let delay = *self.inner.delay.lock();
		let scripted = {
			let mut script = self.inner.script.lock();

			if script.is_empty() { None } else { Some(script.remove(0)) }
		};

		self.inner.requests.lock().push(request);

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			scripted.unwrap_or_else(|| {
				Ok(TokenEndpointResponse::new(format!("token-{n}"))
					.with_expires_in(Duration::hours(1)))
			})
		})
	}
}
