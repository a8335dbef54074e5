//! HTTP service exposing a shared view cache.
//!
//! - [`api`]: Request/response types and route handlers

pub mod api;
