//! services/api/src/lib.rs
//!
//! HTTP service exposing the progress photo journal to the dashboard.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
