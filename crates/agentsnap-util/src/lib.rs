//! Shared utilities for agentsnap.
//!
//! This crate provides common utilities used across the agentsnap workspace:
//! - Logging setup with tracing
//! - Config/data directory lookup and path helpers
//! - RAII-based timing for capture and compare operations

pub mod log;
pub mod path;
pub mod timing;

pub use timing::TimingGuard;
