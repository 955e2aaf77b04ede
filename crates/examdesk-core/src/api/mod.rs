//! REST API client module for the exam management backend.
//!
//! This module provides the `ApiClient` used as the loader boundary of the
//! fetch cells, and the closed `FetchError` taxonomy every loader reports.
//!
//! The API uses JWT bearer token authentication; the token is the same
//! credential the route guard inspects.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::FetchError;
