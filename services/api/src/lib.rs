//! services/api/src/lib.rs
//!
//! The HTTP edge of the LMS onboarding backend: adapters for the core ports,
//! configuration, error rendering and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
