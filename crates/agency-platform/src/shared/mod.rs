//! Shared infrastructure

pub mod api_common;
pub mod authorization;
pub mod clock;
pub mod error;
pub mod health_api;
pub mod middleware;
pub mod tsid;
