//! # pluginhost-core
//!
//! Core crate for PluginHost. Contains the configuration schemas, the layered
//! configuration loader, and the unified error system shared by every other
//! crate in the workspace.
//!
//! This crate has **no** internal dependencies on other PluginHost crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
