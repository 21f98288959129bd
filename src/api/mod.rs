//! API layer: the authenticated request pipeline, the normalized error
//! taxonomy, and thin endpoint adapters on top of it.

pub mod auth;
pub mod buildings;
pub mod client;
pub mod error;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, Envelope, RequestSpec};
pub use error::ApiError;
