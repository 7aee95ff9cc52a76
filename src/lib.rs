//! Task Board Sync Library
//!
//! Client-side state layer for a task board: an optimistic entity cache kept
//! in step with a remote store, debounced field writes, and pure view
//! projections. This module exports the core components for the `taskboard`
//! binary and for integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod defaults;
pub mod error;
pub mod format;
pub mod logging;
pub mod store;
pub mod sync;
pub mod types;
