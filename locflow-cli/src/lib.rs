//! Command implementations of the `locflow` binary, exposed for testing.

pub mod config;
pub mod convert;
pub mod export;
pub mod import;
pub mod validation;
pub mod view;

pub use config::{Config, ForceArg};
