//! Data Transfer Objects for REST request/response serialization.

pub mod auth_dto;

pub use auth_dto::*;
