//! PointQuery - elevation lookups for a single point across many datasets
//!
//! This library coordinates on-demand and speculative lookups against a
//! remote elevation service, rendering a per-dataset status as each lookup
//! progresses.
//!
//! # Architecture
//!
//! ```text
//!  input change ──► Debouncer ──► QueryCoordinator::prefetch ──► ElevationService
//!                                         │                         (prefetch)
//!  form submit ─────────────────► QueryCoordinator::fetch
//!                                         │
//!                   ┌─────────────────────┼──────────────────────┐
//!                   ▼                     ▼                      ▼
//!             point::validate     DatasetRegistry        TimeoutGuard (per dataset)
//!                                         │                      │
//!                                         ▼                      ▼
//!                                   RenderSurface ◄──── "Loading..." / "Request timeout"
//! ```
//!
//! All timing goes through an injected [`scheduler::Scheduler`], so the whole
//! flow can be driven by [`scheduler::ManualScheduler`] in tests.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod debounce;
pub mod logging;
pub mod point;
pub mod scheduler;
pub mod service;
pub mod surface;
pub mod timeout;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
