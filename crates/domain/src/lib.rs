//! Shared foundation for the ARCP server: the workspace-wide error type and
//! the environment-derived configuration tree.

pub mod config;
pub mod error;

pub use config::{ArcpConfig, ConfigIssue, ConfigSeverity};
pub use error::{Error, Result};
