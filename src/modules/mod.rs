//! Modules layer - Infrastructure components for external integrations
//!
//! Contains adapters for the services the console depends on.

pub mod documents;
