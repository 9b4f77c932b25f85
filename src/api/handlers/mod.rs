//! REST endpoint handlers organized by resource.

pub mod auth;
pub mod system;
