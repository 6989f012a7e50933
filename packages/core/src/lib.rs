// Library root. The binary in `src/main.rs` and the integration tests in
// `tests/` both build on these modules.

pub mod archive;
pub mod backfill;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod services;

// Binary plumbing, kept public so integration tests can reach it.
pub mod cli;
pub mod config;
pub mod logging;
