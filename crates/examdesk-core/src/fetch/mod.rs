//! Freshness-aware fetching.
//!
//! A `FetchCell` sits between a view and the remote API: it answers from the
//! TTL store when it can, calls its `Loader` when it must, and exposes the
//! loading/error/data state the view renders.

pub mod cell;

pub use cell::{loader_fn, FetchCell, FetchCellState, FnLoader, Loader};
