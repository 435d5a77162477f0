//! Plumbing shared by the fetch and load pipelines: environment access,
//! process configuration, tracing setup and the pending-load manifest.

pub mod config;
pub mod env;
pub mod logging;
pub mod manifest;
