//! Font library catalog.
//!
//! Scans font directories into a SQLite catalog, keeps per-face activation
//! intent there and reconciles it with the operating system's font
//! registrations. Filesystem changes are fed back through a debounced queue.

pub mod config;
pub mod db;
pub mod error;
pub mod facets;
pub mod introspect;
pub mod library;
pub mod logging;
pub mod reconcile;
pub mod registry;
pub mod scanner;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use library::{ChangeOutcome, Library, LibraryOptions};
