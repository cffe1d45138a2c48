//! Configuration module for clubdues
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Host-application settings persistence

pub mod paths;
pub mod settings;

pub use paths::DuesPaths;
pub use settings::Settings;
