//! queuewatch - job queue monitoring dashboard.

pub mod backend;
pub mod client;
pub mod config;
pub mod stats;
pub mod web;
