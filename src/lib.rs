//! # Armory Scrape: Schema-Driven Character Profile Extraction
//!
//! Reads World of Warcraft Armory pages and turns them into typed records.
//! What is read from where lives in a YAML schema, not in code.
//!
//! ## Features
//!
//! - **Declarative schema**: Each record field is an expression over the page markup
//! - **Closed expression language**: `attr`, `text`, `count`, `concat`, literals and variables, piped through registered transforms
//! - **Load-time validation**: Expressions, transforms and selectors are checked when the schema loads
//! - **Typed records**: `Character` and `ArenaTeam` are checked against the schema on client construction
//! - **Lazy sub-resources**: Arena teams are fetched on first access and cached per character
//!
//! ## Example: Schema
//!
//! ```yaml
//! character:
//!   file: character-sheet.xml
//!   fields:
//!     name:
//!       expr: attr("characterInfo character", "name")
//!       required: true
//!     last_modified:
//!       expr: attr("characterInfo character", "lastModified") | timestamp("%B %d, %Y")
//!       type: timestamp
//! ```
//!
//! ## Example: Lookup
//!
//! ```ignore
//! use armory_scrape::Armory;
//!
//! let armory = Armory::from_env()?;
//! let mut character = armory.find_character("us", "Whisperwind", "Hightops")?;
//! println!("{}", character.description());
//!
//! for (size, team) in character.arena_teams(&armory)?.iter() {
//!     println!("{}v{}: {} ({})", size.players(), size.players(), team.name, team.rating);
//! }
//! ```

// Core modules
pub mod entity;
pub mod error;
pub mod extraction;
pub mod transform_registry;

// Documents and where they come from
pub mod config;
pub mod document;
pub mod locator;
pub mod source;

// Schema registry and materialization
pub mod runtime;

// Records and the client
pub mod character;
pub mod client;

// Re-export key types
pub use entity::{Entity, EntityInstance, FieldValue, ValueType};
pub use error::{ArmoryError, EvalError};
pub use extraction::{Evaluator, Expression, Extractor};
pub use transform_registry::TransformRegistry;

pub use config::ArmoryConfig;
pub use document::Document;
pub use locator::{build_url, build_url_with_base};
pub use source::{DocumentSource, HttpSource};

// Re-export runtime types
pub use runtime::{DocumentContext, Materializer, SchemaRegistry};

pub use character::{ArenaTeam, ArenaTeams, ArenaTeamsState, Character, TeamSize};
pub use client::Armory;
