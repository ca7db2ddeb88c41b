//! CLI command implementations.

pub mod catalog;
pub mod common;
pub mod config;
pub mod query;
pub mod session;
