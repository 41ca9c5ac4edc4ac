// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::{_prelude::*, auth::SchemeName, error::ConfigError};

/// Tunables shared by every owner the manager serves.
///
/// Durations are expressed in whole seconds when (de)serialized. Missing fields fall back to
/// [`TokenManagerOptions::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenManagerOptions {
	/// Safety margin subtracted from `expires_at` when judging freshness.
	#[serde(with = "seconds")]
	pub clock_skew: Duration,
	/// Lifetime assumed when the token endpoint omits `expires_in`.
	#[serde(with = "seconds")]
	pub default_token_lifetime: Duration,
	/// Scheme used for user owners that name none themselves.
	pub default_scheme: Option<SchemeName>,
}
impl TokenManagerOptions {
	/// Default freshness margin.
	pub const DEFAULT_CLOCK_SKEW: Duration = Duration::seconds(60);
	/// Default lifetime for tokens without `expires_in`.
	pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(1);

	/// Parses options from JSON, reporting the path of the first invalid field.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let options: Self =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_str(raw)).map_err(
				|e| ConfigError::InvalidOptions {
					path: e.path().to_string(),
					message: e.inner().to_string(),
				},
			)?;

		if options.clock_skew.is_negative() || !options.default_token_lifetime.is_positive() {
			return Err(ConfigError::InvalidOptions {
				path: ".".into(),
				message: "durations must be non-negative and the default lifetime positive".into(),
			});
		}

		Ok(options)
	}

	/// Overrides the freshness margin; negative values clamp to zero.
	pub fn with_clock_skew(mut self, skew: Duration) -> Self {
		self.clock_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Overrides the lifetime assumed for tokens without `expires_in`.
	pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
		self.default_token_lifetime = lifetime;

		self
	}

	/// Sets the default user scheme.
	pub fn with_default_scheme(mut self, scheme: SchemeName) -> Self {
		self.default_scheme = Some(scheme);

		self
	}
}
impl Default for TokenManagerOptions {
	fn default() -> Self {
		Self {
			clock_skew: Self::DEFAULT_CLOCK_SKEW,
			default_token_lifetime: Self::DEFAULT_TOKEN_LIFETIME,
			default_scheme: None,
		}
	}
}

mod seconds {
	// self
	use super::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
