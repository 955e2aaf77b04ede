//! examdesk-core - client-side data freshness for the exam administration
//! dashboard.
//!
//! This crate provides:
//! - `cache`: namespaced TTL storage over a persistent key-value medium
//! - `fetch`: freshness-aware fetch cells with loading and error state
//! - `prefetch`: idle-time, concurrency-bounded navigation prefetching
//! - `auth`: credential storage and the pre-navigation route guard
//! - `api`, `dashboard`: the backend client and the stores built on it

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod fetch;
pub mod models;
pub mod navigator;
pub mod prefetch;
pub mod routes;

#[cfg(test)]
mod testing;

pub use config::Config;
