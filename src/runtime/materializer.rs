//! Applies an entity schema to a parsed document.

use crate::entity::{Entity, EntityInstance};
use crate::error::ArmoryError;
use crate::extraction::{Evaluator, Extractor};
use crate::runtime::config_loader::SchemaRegistry;
use crate::runtime::context::DocumentContext;

/// Builds entity instances from documents using a schema registry.
///
/// Fields are evaluated in declaration order. An optional field whose selector
/// matches nothing, or whose value cannot be coerced, takes its type's default.
/// A required field with the same problem fails the whole entity. Any other
/// evaluation error means the schema is wrong, so it always fails.
pub struct Materializer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> Materializer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Materialize `entity_type` from `document`.
    ///
    /// # Errors
    /// `SchemaNotFound` for an unknown type, `Materialization` when a field
    /// cannot be produced.
    pub fn materialize(
        &self,
        entity_type: &str,
        document: &dyn Extractor,
        context: &DocumentContext,
    ) -> Result<EntityInstance, ArmoryError> {
        let schema = self.registry.schema_for(entity_type)?;
        let evaluator = Evaluator::new(self.registry.transforms());
        let mut instance = EntityInstance::new(entity_type);

        for field in &schema.fields {
            let value = match evaluator.evaluate_as(
                document,
                &field.expression,
                context,
                field.value_type,
            ) {
                Ok(value) => value,
                Err(e) if !field.required && e.is_recoverable() => {
                    tracing::debug!(
                        entity = entity_type,
                        field = %field.name,
                        error = %e,
                        "field defaulted"
                    );
                    field.value_type.default_value()
                }
                Err(e) => {
                    return Err(ArmoryError::Materialization {
                        entity: entity_type.to_string(),
                        field: field.name.clone(),
                        source: e,
                    })
                }
            };

            instance.set(field.name.clone(), value);
        }

        Ok(instance)
    }

    /// Materialize and convert to the typed record `E`.
    pub fn materialize_entity<E: Entity>(
        &self,
        document: &dyn Extractor,
        context: &DocumentContext,
    ) -> Result<E, ArmoryError> {
        let instance = self.materialize(E::NAME, document, context)?;
        Ok(E::from_instance(&instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::entity::FieldValue;
    use crate::error::EvalError;

    const SCHEMA: &str = r#"
character:
  file: character-sheet.xml
  fields:
    name:
      expr: attr("characterInfo character", "name")
      required: true
    prefix: attr("characterInfo character", "prefix")
    level:
      expr: attr("characterInfo character", "level")
      type: integer
      required: true
    points:
      expr: attr("characterInfo character", "points")
      type: integer
    guild_name: attr("characterInfo character", "guildName")

arena_team:
  file: character-arenateams.xml
  presence: 'arenaTeam[teamSize="{size}"]'
  fields:
    name:
      expr: attr('arenaTeam[teamSize="{size}"]', "name")
      required: true
    team_size:
      expr: $size
      type: integer
"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::load(SCHEMA).unwrap()
    }

    #[test]
    fn test_materialize_in_declaration_order() {
        let registry = registry();
        let doc = Document::parse(
            r#"<characterInfo><character name="Adries" level="48" points="1200" guildName="Impact"></character></characterInfo>"#,
        );

        let instance = Materializer::new(&registry)
            .materialize("character", &doc, &DocumentContext::empty())
            .unwrap();

        assert_eq!(instance.entity_type(), "character");
        let names: Vec<&str> = instance.field_names().collect();
        assert_eq!(names, vec!["name", "prefix", "level", "points", "guild_name"]);
        assert_eq!(instance.get("level"), Some(&FieldValue::Integer(48)));
        assert_eq!(instance.string("guild_name"), "Impact");
    }

    #[test]
    fn test_optional_fields_default() {
        let registry = registry();
        let doc = Document::parse(
            r#"<characterInfo><character name="Adries" level="48" points="lots"></character></characterInfo>"#,
        );

        let instance = Materializer::new(&registry)
            .materialize("character", &doc, &DocumentContext::empty())
            .unwrap();

        assert_eq!(instance.get("prefix"), Some(&FieldValue::String(String::new())));
        assert_eq!(instance.get("guild_name"), Some(&FieldValue::String(String::new())));
        assert_eq!(instance.get("points"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_required_field_missing() {
        let registry = registry();
        let doc = Document::parse(r#"<characterInfo><character name="Adries"></character></characterInfo>"#);

        let err = Materializer::new(&registry)
            .materialize("character", &doc, &DocumentContext::empty())
            .unwrap_err();

        match err {
            ArmoryError::Materialization { entity, field, source } => {
                assert_eq!(entity, "character");
                assert_eq!(field, "level");
                assert!(matches!(source, EvalError::SelectorNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_required_field_bad_type() {
        let registry = registry();
        let doc = Document::parse(
            r#"<characterInfo><character name="Adries" level="high"></character></characterInfo>"#,
        );

        let err = Materializer::new(&registry)
            .materialize("character", &doc, &DocumentContext::empty())
            .unwrap_err();

        assert!(matches!(
            err,
            ArmoryError::Materialization { source: EvalError::TypeCoercion { .. }, .. }
        ));
    }

    #[test]
    fn test_context_variable_reaches_selectors() {
        let registry = registry();
        let doc = Document::parse(
            r#"<arenaTeams><arenaTeam teamSize="2" name="Orange Team"></arenaTeam><arenaTeam teamSize="5" name="Five Alive"></arenaTeam></arenaTeams>"#,
        );
        let ctx = DocumentContext::empty().with_value("size", 5);

        let instance = Materializer::new(&registry)
            .materialize("arena_team", &doc, &ctx)
            .unwrap();

        assert_eq!(instance.string("name"), "Five Alive");
        assert_eq!(instance.integer("team_size"), 5);
    }

    #[test]
    fn test_unbound_variable_always_fails() {
        let registry = registry();
        let doc = Document::parse(r#"<arenaTeam teamSize="2" name="Orange Team"></arenaTeam>"#);

        let err = Materializer::new(&registry)
            .materialize("arena_team", &doc, &DocumentContext::empty())
            .unwrap_err();

        assert!(matches!(
            err,
            ArmoryError::Materialization { source: EvalError::UnknownVariable(_), .. }
        ));
    }

    #[test]
    fn test_unknown_entity_type() {
        let registry = registry();
        let doc = Document::parse("<page></page>");

        assert!(matches!(
            Materializer::new(&registry).materialize("guild", &doc, &DocumentContext::empty()),
            Err(ArmoryError::SchemaNotFound(_))
        ));
    }
}
