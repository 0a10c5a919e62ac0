//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `tcpsub` crate.
//!
//! It centralizes the crate-wide error type and the logging bootstrap.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
