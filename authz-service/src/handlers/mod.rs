//! HTTP handlers for authz-service.

pub mod authorize;
pub mod metrics;
