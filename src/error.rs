//! Manager-level error types shared across the cache, endpoint, assertion, and session layers.
//!
//! Every variant is [`Clone`] because a single acquisition failure is fanned out to each caller
//! that joined the same in-flight request. Underlying sources are therefore held behind [`Arc`].

// self
use crate::_prelude::*;

/// Manager-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shareable boxed error used for transport and builder sources.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Token endpoint was reachable but rejected the request or answered with garbage.
	#[error("Token acquisition failed with `{error}`{}.", describe(.description))]
	AcquisitionFailed {
		/// OAuth `error` code, or a manager-assigned code for malformed responses.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network, timeout, or I/O failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The assertion provider could not produce a required client assertion.
	#[error(transparent)]
	AssertionFailed(#[from] AssertionError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Authentication-session backend failure.
	#[error("{0}")]
	Session(
		#[from]
		#[source]
		crate::session::SessionError,
	),
	/// The caller's cancellation token fired before a token became available.
	#[error("Token request was cancelled.")]
	Cancelled,
}
impl Error {
	/// Builds an [`Error::AcquisitionFailed`] from an OAuth error code.
	pub fn acquisition_failed(error: impl Into<String>) -> Self {
		Self::AcquisitionFailed { error: error.into(), description: None, status: None }
	}

	/// Returns the upstream OAuth error code for [`Error::AcquisitionFailed`].
	pub fn oauth_error(&self) -> Option<&str> {
		match self {
			Self::AcquisitionFailed { error, .. } => Some(error),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error("Token request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: SharedError,
	},
	/// Token endpoint URL was rejected by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Client descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::client::ClientDescriptorError),
	/// Manager options could not be parsed.
	#[error("Manager options are invalid at `{path}`: {message}.")]
	InvalidOptions {
		/// Path to the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// No client registration exists under the provided name.
	#[error("No client is registered under `{client}`.")]
	UnknownClient {
		/// Requested client name.
		client: String,
	},
	/// No client registration exists for the user's authentication scheme.
	#[error("No user client is registered for scheme `{scheme}`.")]
	UnknownScheme {
		/// Requested scheme name, or `<default>`.
		scheme: String,
	},
	/// The client authenticates with a secret but none was configured.
	#[error("Client `{client}` requires a client secret.")]
	MissingClientSecret {
		/// Client name.
		client: String,
	},
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a request construction failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpRequest { source: Arc::new(src) }
	}
}

/// Transport-level failures (network, timeout, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The token endpoint did not answer in time.
	#[error("Request timed out while calling the token endpoint.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[source] Arc<std::io::Error>),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Failures raised while producing a client assertion.
#[derive(Clone, Debug, ThisError)]
pub enum AssertionError {
	/// The assertion signer rejected the payload.
	#[error("Assertion signer failed: {reason}.")]
	Signing {
		/// Signer-supplied reason.
		reason: String,
	},
	/// Assertion claims could not be encoded.
	#[error("Assertion claims could not be encoded.")]
	Encoding {
		/// Serialization failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// The configured strategy requires data the request did not carry.
	#[error("Assertion for `{owner}` could not be produced: {reason}.")]
	Unavailable {
		/// Client name or configuration scheme.
		owner: String,
		/// Provider-supplied reason.
		reason: String,
	},
}
impl From<serde_json::Error> for AssertionError {
	fn from(e: serde_json::Error) -> Self {
		Self::Encoding { source: Arc::new(e) }
	}
}

fn describe(description: &Option<String>) -> String {
	description.as_deref().map(|value| format!(": {value}")).unwrap_or_default()
}
