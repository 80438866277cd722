//! Schema registry: entity schemas loaded from YAML.
//!
//! The schema file maps each entity type to the file template used to build
//! its URL plus an ordered field list:
//!
//! ```yaml
//! character:
//!   file: character-sheet.xml
//!   fields:
//!     name:
//!       expr: attr("characterInfo character", "name")
//!       required: true
//!     prefix: attr("characterInfo character", "prefix")
//!     level:
//!       expr: attr("characterInfo character", "level")
//!       type: integer
//!       required: true
//!
//! arena_team:
//!   file: character-arenateams.xml
//!   presence: arenaTeam[teamSize="{size}"]
//!   fields:
//!     rating:
//!       expr: attr('arenaTeam[teamSize="{size}"]', "rating")
//!       type: integer
//! ```
//!
//! A bare string is shorthand for an optional string field. Every expression
//! and selector is checked at load time, so a registry that loaded is safe to
//! evaluate.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::document::Document;
use crate::entity::{Entity, ValueType};
use crate::error::ArmoryError;
use crate::extraction::{with_placeholder_samples, Expression};
use crate::transform_registry::TransformRegistry;

/// The schema shipped with the crate.
pub const BUILTIN_SCHEMA: &str = include_str!("../../config/armory.yaml");

/// One named extraction rule plus its target type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub expression: Expression,
    pub value_type: ValueType,
    pub required: bool,
}

/// Ordered field definitions for one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    pub entity_type: String,
    /// File template passed to URL construction
    pub file: String,
    /// Selector whose presence gates extraction of a variant
    pub presence: Option<String>,
    pub fields: Vec<FieldDefinition>,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    file: String,
    #[serde(default)]
    presence: Option<String>,
    fields: IndexMap<String, RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawField {
    Expr(String),
    Full {
        expr: String,
        #[serde(rename = "type", default = "default_value_type")]
        value_type: ValueType,
        #[serde(default)]
        required: bool,
    },
}

fn default_value_type() -> ValueType {
    ValueType::String
}

/// Immutable set of entity schemas plus the transform vocabulary they use.
pub struct SchemaRegistry {
    schemas: HashMap<String, EntitySchema>,
    transforms: TransformRegistry,
}

impl SchemaRegistry {
    /// Load schemas from YAML source text.
    ///
    /// # Errors
    /// Returns `ArmoryError::Schema` for malformed YAML, unparseable
    /// expressions, unknown transforms, or selectors that do not compile.
    pub fn load(source: &str) -> Result<Self, ArmoryError> {
        let raw: IndexMap<String, RawSchema> = serde_yaml::from_str(source)
            .map_err(|e| ArmoryError::schema(format!("failed to parse YAML: {}", e)))?;

        let transforms = TransformRegistry::builtin();
        let mut schemas = HashMap::new();

        for (entity_type, raw_schema) in raw {
            let schema = build_schema(&entity_type, raw_schema, &transforms)?;
            tracing::debug!(
                entity = %entity_type,
                fields = schema.fields.len(),
                "loaded entity schema"
            );
            schemas.insert(entity_type, schema);
        }

        Ok(Self {
            schemas,
            transforms,
        })
    }

    /// Load schemas from a YAML file.
    ///
    /// # Example
    /// ```ignore
    /// use armory_scrape::SchemaRegistry;
    ///
    /// let registry = SchemaRegistry::load_from_file("config/armory.yaml")?;
    /// let character = registry.schema_for("character")?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArmoryError> {
        let contents = fs::read_to_string(path)?;
        Self::load(&contents)
    }

    /// The schema file embedded in the crate.
    pub fn builtin() -> Result<Self, ArmoryError> {
        Self::load(BUILTIN_SCHEMA)
    }

    /// Look up the schema for `entity_type`.
    pub fn schema_for(&self, entity_type: &str) -> Result<&EntitySchema, ArmoryError> {
        self.schemas
            .get(entity_type)
            .ok_or_else(|| ArmoryError::SchemaNotFound(entity_type.to_string()))
    }

    /// Check that the schema for `E` declares every field `E` reads, with the
    /// type `E` expects.
    pub fn ensure_entity<E: Entity>(&self) -> Result<(), ArmoryError> {
        let schema = self.schema_for(E::NAME)?;

        for (name, expected) in E::FIELDS {
            let field = schema.field(name).ok_or_else(|| {
                ArmoryError::schema(format!("{} schema is missing field `{}`", E::NAME, name))
            })?;

            if field.value_type != *expected {
                return Err(ArmoryError::schema(format!(
                    "{}.{} is declared as {} but the record expects {}",
                    E::NAME,
                    name,
                    field.value_type,
                    expected
                )));
            }
        }

        Ok(())
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Get all entity type names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn build_schema(
    entity_type: &str,
    raw: RawSchema,
    transforms: &TransformRegistry,
) -> Result<EntitySchema, ArmoryError> {
    if raw.file.trim().is_empty() {
        return Err(ArmoryError::schema(format!(
            "{} has an empty file template",
            entity_type
        )));
    }

    if let Some(presence) = &raw.presence {
        check_selector(entity_type, "presence", presence)?;
    }

    let mut fields = Vec::with_capacity(raw.fields.len());

    for (name, raw_field) in raw.fields {
        let (source, value_type, required) = match raw_field {
            RawField::Expr(expr) => (expr, ValueType::String, false),
            RawField::Full {
                expr,
                value_type,
                required,
            } => (expr, value_type, required),
        };

        let expression = Expression::parse(&source)
            .map_err(|e| ArmoryError::schema(format!("{}.{}: {}", entity_type, name, e)))?;

        expression
            .check_transforms(transforms)
            .map_err(|e| ArmoryError::schema(format!("{}.{}: {}", entity_type, name, e)))?;

        for selector in expression.selectors() {
            check_selector(entity_type, &name, selector)?;
        }

        fields.push(FieldDefinition {
            name,
            expression,
            value_type,
            required,
        });
    }

    Ok(EntitySchema {
        entity_type: entity_type.to_string(),
        file: raw.file,
        presence: raw.presence,
        fields,
    })
}

fn check_selector(entity_type: &str, field: &str, selector: &str) -> Result<(), ArmoryError> {
    Document::compile(&with_placeholder_samples(selector))
        .map(|_| ())
        .map_err(|e| ArmoryError::schema(format!("{}.{}: {}", entity_type, field, e)))
}
