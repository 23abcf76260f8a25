//! Middleware for the organization service HTTP surface.

pub mod auth;
pub mod http_metrics;
