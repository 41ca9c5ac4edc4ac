//! Auth-domain identifiers, scope sets, secrets, and access tokens.

pub mod id;
pub mod scope;
pub mod token;

pub use id::*;
pub use scope::*;
pub use token::{access::*, secret::*};
