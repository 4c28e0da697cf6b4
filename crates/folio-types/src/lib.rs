//! Shared types for the Folio backend.
//!
//! `api` holds the JSON request/response shapes, `models` the small pieces of
//! domain logic that both the database layer and the handlers need.

pub mod api;
pub mod models;
