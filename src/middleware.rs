//! `reqwest-middleware` interceptors that attach bearer tokens to outgoing requests.
//!
//! Both interceptors follow the same protocol:
//!
//! 1. Ask the [`TokenManager`] for a token and attach it as `Authorization: Bearer <token>`.
//! 2. Send the request.
//! 3. If the response is `401` and the request body can be replayed, force a renewal, attach the
//!    new token to a fresh copy of the request, and send it exactly once more. The second response
//!    is returned whatever its status.
//!
//! Acquisition failures never fail the outgoing request: it is sent without a token instead. The
//! exception is cancellation. A [`CancellationToken`] stored in the request extensions aborts the
//! request with [`reqwest_middleware::Error::Middleware`] once it fires while a token is awaited,
//! and nothing is sent. A [`TokenRequestParameters`] stored there overrides the interceptor's
//! parameters for that request.

// crates.io
use http::Extensions;
use reqwest::{
	Request, Response, StatusCode,
	header::{AUTHORIZATION, HeaderValue},
};
use reqwest_middleware::{Error as MiddlewareError, Middleware, Next, Result as MiddlewareResult};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::ClientName,
	manager::{TokenManager, TokenOwner, TokenRequestParameters, UserContext},
	obs,
};

/// Attaches application tokens acquired with the `client_credentials` grant.
#[derive(Clone, Debug)]
pub struct ClientCredentialsMiddleware {
	manager: TokenManager,
	owner: TokenOwner,
	parameters: TokenRequestParameters,
}
impl ClientCredentialsMiddleware {
	/// Creates an interceptor for the registered client `client`.
	pub fn new(manager: TokenManager, client: ClientName) -> Self {
		Self {
			manager,
			owner: TokenOwner::Client(client),
			parameters: TokenRequestParameters::default(),
		}
	}

	/// Sets the parameters used for every request (scope, resource, extra fields).
	pub fn with_parameters(mut self, parameters: TokenRequestParameters) -> Self {
		self.parameters = parameters;

		self
	}
}
#[async_trait::async_trait]
impl Middleware for ClientCredentialsMiddleware {
	async fn handle(
		&self,
		req: Request,
		extensions: &mut Extensions,
		next: Next<'_>,
	) -> MiddlewareResult<Response> {
		intercept(&self.manager, &self.owner, &self.parameters, req, extensions, next).await
	}
}

/// Attaches delegated tokens of the user stored in the request extensions.
///
/// Insert a [`UserContext`] into the request extensions to select the user. Requests without one
/// are sent untouched.
#[derive(Clone, Debug)]
pub struct UserTokenMiddleware {
	manager: TokenManager,
	parameters: TokenRequestParameters,
}
impl UserTokenMiddleware {
	/// Creates an interceptor backed by `manager`.
	pub fn new(manager: TokenManager) -> Self {
		Self { manager, parameters: TokenRequestParameters::default() }
	}

	/// Sets the parameters used for every request (scope, resource, challenge scheme).
	pub fn with_parameters(mut self, parameters: TokenRequestParameters) -> Self {
		self.parameters = parameters;

		self
	}
}
#[async_trait::async_trait]
impl Middleware for UserTokenMiddleware {
	async fn handle(
		&self,
		req: Request,
		extensions: &mut Extensions,
		next: Next<'_>,
	) -> MiddlewareResult<Response> {
		let Some(user) = extensions.get::<UserContext>().cloned() else {
			return next.run(req, extensions).await;
		};

		intercept(&self.manager, &TokenOwner::User(user), &self.parameters, req, extensions, next)
			.await
	}
}

async fn intercept(
	manager: &TokenManager,
	owner: &TokenOwner,
	parameters: &TokenRequestParameters,
	mut req: Request,
	extensions: &mut Extensions,
	next: Next<'_>,
) -> MiddlewareResult<Response> {
	let cancel = extensions.get::<CancellationToken>().cloned();
	let parameters = extensions.get::<TokenRequestParameters>().unwrap_or(parameters).clone();
	// Cloned before the first token is attached so the replay never carries the rejected one.
	let replay = req.try_clone();

	attach_token(manager, owner, &parameters, cancel.as_ref(), &mut req).await?;

	let response = next.clone().run(req, extensions).await?;

	if response.status() != StatusCode::UNAUTHORIZED {
		return Ok(response);
	}

	let Some(mut replay) = replay else {
		return Ok(response);
	};

	obs::log_interceptor_retry(owner);

	let forced = parameters.with_force_renewal(true);

	attach_token(manager, owner, &forced, cancel.as_ref(), &mut replay).await?;

	next.run(replay, extensions).await
}

async fn attach_token(
	manager: &TokenManager,
	owner: &TokenOwner,
	parameters: &TokenRequestParameters,
	cancel: Option<&CancellationToken>,
	req: &mut Request,
) -> MiddlewareResult<()> {
	let token = match cancel {
		Some(cancel) =>
			manager.get_access_token_with_cancellation(owner, parameters, cancel).await,
		None => manager.get_access_token(owner, parameters).await,
	};
	let token = match token {
		Ok(token) if token.is_empty() => return Ok(()),
		Ok(token) => token,
		Err(Error::Cancelled) => return Err(MiddlewareError::middleware(Error::Cancelled)),
		Err(e) => {
			obs::log_interceptor_fallback(owner, &e);

			return Ok(());
		},
	};

	match HeaderValue::from_str(&token.bearer()) {
		Ok(mut value) => {
			value.set_sensitive(true);
			req.headers_mut().insert(AUTHORIZATION, value);
		},
		Err(_) => {
			let e = Error::AcquisitionFailed {
				error: "invalid_token".into(),
				description: Some("the token is not a valid header value".into()),
				status: None,
			};

			obs::log_interceptor_fallback(owner, &e);
		},
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use reqwest::Client;
	use reqwest_middleware::ClientBuilder;
	// self
	use super::*;
	use crate::{
		auth::SubjectId,
		client::ClientDescriptor,
		endpoint::{EndpointFuture, TokenEndpoint, TokenEndpointRequest, TokenEndpointResponse},
		error::TransportError,
		session::{MemorySessionStore, SessionKey, UserTokens},
	};

	/// Issues `token-1`, `token-2`, ... and counts forced and unforced grants.
	#[derive(Default)]
	struct CountingEndpoint {
		calls: AtomicUsize,
		failing: bool,
	}
	impl TokenEndpoint for CountingEndpoint {
		fn request_token(
			&self,
			_: TokenEndpointRequest,
		) -> EndpointFuture<'_, TokenEndpointResponse> {
			let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			let failing = self.failing;

			Box::pin(async move {
				if failing {
					return Err(TransportError::Timeout.into());
				}

				Ok(TokenEndpointResponse::new(format!("token-{n}"))
					.with_expires_in(Duration::hours(1)))
			})
		}
	}

	/// Terminal middleware that records the `Authorization` header and answers with `status`.
	struct Recorder {
		status: StatusCode,
		seen: Mutex<Vec<Option<String>>>,
	}
	impl Recorder {
		fn new(status: StatusCode) -> Arc<Self> {
			Arc::new(Self { status, seen: Mutex::new(Vec::new()) })
		}

		fn seen(&self) -> Vec<Option<String>> {
			self.seen.lock().clone()
		}
	}
	#[async_trait::async_trait]
	impl Middleware for Recorder {
		async fn handle(
			&self,
			req: Request,
			_: &mut Extensions,
			_: Next<'_>,
		) -> MiddlewareResult<Response> {
			let header = req
				.headers()
				.get(AUTHORIZATION)
				.map(|value| value.to_str().expect("Header should be ASCII.").to_owned());

			self.seen.lock().push(header);

			let response = http::Response::builder()
				.status(self.status)
				.body(&b""[..])
				.expect("Response should build.");

			Ok(response.into())
		}
	}

	fn client_name() -> ClientName {
		ClientName::new("billing").expect("Client name should be valid.")
	}

	fn descriptor() -> ClientDescriptor {
		ClientDescriptor::builder(client_name())
			.token_endpoint(Url::parse("https://idp.example.com/token").expect("URL should parse."))
			.client_id("billing-client")
			.client_secret("s3cret")
			.build()
			.expect("Descriptor should build.")
	}

	fn manager(endpoint: CountingEndpoint) -> TokenManager {
		TokenManager::builder(endpoint).client(descriptor()).user_client(None, descriptor()).build()
	}

	#[tokio::test]
	async fn unauthorized_response_is_retried_once_with_a_renewed_token() {
		let manager = manager(CountingEndpoint::default());
		let recorder = Recorder::new(StatusCode::UNAUTHORIZED);
		let client = ClientBuilder::new(Client::default())
			.with(ClientCredentialsMiddleware::new(manager.clone(), client_name()))
			.with_arc(recorder.clone())
			.build();
		let resp = client
			.get("https://api.example.com/invoices")
			.send()
			.await
			.expect("Request should complete.");

		assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(
			recorder.seen(),
			vec![Some("Bearer token-1".to_owned()), Some("Bearer token-2".to_owned())]
		);
		assert_eq!(manager.cache_metrics().acquisitions(), 2);
	}

	#[tokio::test]
	async fn successful_response_is_sent_once() {
		let manager = manager(CountingEndpoint::default());
		let recorder = Recorder::new(StatusCode::OK);
		let client = ClientBuilder::new(Client::default())
			.with(ClientCredentialsMiddleware::new(manager, client_name()))
			.with_arc(recorder.clone())
			.build();

		for _ in 0..2 {
			let resp = client
				.get("https://api.example.com/invoices")
				.send()
				.await
				.expect("Request should complete.");

			assert_eq!(resp.status(), StatusCode::OK);
		}

		assert_eq!(
			recorder.seen(),
			vec![Some("Bearer token-1".to_owned()), Some("Bearer token-1".to_owned())]
		);
	}

	#[tokio::test]
	async fn acquisition_failure_sends_without_a_token() {
		let manager = manager(CountingEndpoint { failing: true, ..Default::default() });
		let recorder = Recorder::new(StatusCode::OK);
		let client = ClientBuilder::new(Client::default())
			.with(ClientCredentialsMiddleware::new(manager, client_name()))
			.with_arc(recorder.clone())
			.build();
		let resp = client
			.get("https://api.example.com/invoices")
			.send()
			.await
			.expect("Request should still be sent.");

		assert_eq!(resp.status(), StatusCode::OK);
		assert_eq!(recorder.seen(), vec![None]);
	}

	#[tokio::test]
	async fn cancelled_request_is_never_sent() {
		let manager = manager(CountingEndpoint::default());
		let recorder = Recorder::new(StatusCode::OK);
		let client = ClientBuilder::new(Client::default())
			.with(ClientCredentialsMiddleware::new(manager.clone(), client_name()))
			.with_arc(recorder.clone())
			.build();
		let cancel = CancellationToken::new();

		cancel.cancel();

		let err = client
			.get("https://api.example.com/invoices")
			.with_extension(cancel)
			.send()
			.await
			.expect_err("Cancelled requests must fail.");

		assert!(matches!(
			err,
			MiddlewareError::Middleware(e) if matches!(e.downcast_ref(), Some(Error::Cancelled))
		));
		assert!(recorder.seen().is_empty());
		assert_eq!(manager.cache_metrics().acquisitions(), 0);
	}

	#[tokio::test]
	async fn user_middleware_reads_the_user_from_extensions() {
		let subject = SubjectId::new("alice").expect("Subject should be valid.");
		let sessions = MemorySessionStore::default();

		sessions.insert(
			SessionKey::new(subject.clone(), None),
			UserTokens::new(
				crate::auth::AccessToken::new("session-token", OffsetDateTime::now_utc()),
				Some("refresh-1".into()),
			),
		);

		let manager = TokenManager::builder(CountingEndpoint::default())
			.user_client(None, descriptor())
			.sessions(Arc::new(sessions))
			.build();
		let recorder = Recorder::new(StatusCode::OK);
		let client = ClientBuilder::new(Client::default())
			.with(UserTokenMiddleware::new(manager))
			.with_arc(recorder.clone())
			.build();

		client
			.get("https://api.example.com/me")
			.send()
			.await
			.expect("Anonymous request should complete.");
		client
			.get("https://api.example.com/me")
			.with_extension(UserContext::new(subject))
			.send()
			.await
			.expect("User request should complete.");

		assert_eq!(recorder.seen(), vec![None, Some("Bearer token-1".to_owned())]);
	}
}
