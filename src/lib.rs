//! Access token lifecycle management for outbound HTTP clients.
//!
//! Tokens are cached per owner and request shape with single-flight acquisition. Client
//! assertions are pluggable, and a bearer-attaching middleware retries once on `401`.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod assertion;
pub mod auth;
pub mod cache;
pub mod client;
pub mod clock;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod manager;
#[cfg(feature = "reqwest")] pub mod middleware;
pub mod obs;
pub mod session;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(feature = "reqwest")] pub use reqwest_middleware;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
