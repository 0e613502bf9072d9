//! benchgrid - cached benchmark experiment runner
//!
//! Enumerates a static experiment matrix, computes missing results locally
//! or across a fleet of ssh-reachable hosts, and caches every scored result
//! on disk under a version-tagged key.
//!
//! The `benchgrid` binary wires the built-in synthetic evaluator into this
//! library; embedders supply their own [`evaluator::Evaluator`] and
//! [`evaluator::Catalog`] implementations and drive the same executors.
//! [`remote::mock::MockShell`] is a network-free transport for testing
//! either kind of setup.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod logging;
pub mod matrix;
pub mod remote;
pub mod types;
pub mod version;
