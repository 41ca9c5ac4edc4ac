//! Token value types handed out by the manager.

pub mod access;
pub mod secret;
