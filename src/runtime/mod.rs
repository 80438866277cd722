//! Schema-driven extraction runtime.
//!
//! Loads entity schemas once, then materializes entity instances from parsed
//! documents with per-call substitution variables.

pub mod config_loader;
pub mod context;
pub mod materializer;

// Re-export key types
pub use config_loader::{EntitySchema, FieldDefinition, SchemaRegistry, BUILTIN_SCHEMA};
pub use context::DocumentContext;
pub use materializer::Materializer;
