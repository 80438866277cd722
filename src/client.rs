//! The Armory client: schema registry + document source + configuration.

use crate::character::{ArenaTeam, ArenaTeams, Character, TeamSize};
use crate::config::ArmoryConfig;
use crate::entity::Entity;
use crate::error::{ArmoryError, EvalError};
use crate::extraction::{substitute, Extractor};
use crate::runtime::{DocumentContext, Materializer, SchemaRegistry};
use crate::source::{DocumentSource, HttpSource};

/// Entry point for character lookups.
///
/// The registry is checked against the `Character` and `ArenaTeam` record
/// shapes on construction, so a mismatched schema fails here rather than
/// mid-extraction.
pub struct Armory<S = HttpSource> {
    schemas: SchemaRegistry,
    source: S,
    config: ArmoryConfig,
}

impl Armory<HttpSource> {
    /// Client over HTTP configured from the environment.
    ///
    /// The schema is read from `ARMORY_SCHEMA` when set, otherwise the
    /// embedded schema is used.
    pub fn from_env() -> Result<Self, ArmoryError> {
        let schemas = match std::env::var("ARMORY_SCHEMA") {
            Ok(path) if !path.trim().is_empty() => SchemaRegistry::load_from_file(path)?,
            _ => SchemaRegistry::builtin()?,
        };

        Self::new(schemas, ArmoryConfig::default())
    }

    pub fn new(schemas: SchemaRegistry, config: ArmoryConfig) -> Result<Self, ArmoryError> {
        let source = HttpSource::new(&config)?;
        Self::with_source(schemas, source, config)
    }
}

impl<S: DocumentSource> Armory<S> {
    pub fn with_source(
        schemas: SchemaRegistry,
        source: S,
        config: ArmoryConfig,
    ) -> Result<Self, ArmoryError> {
        schemas.ensure_entity::<Character>()?;
        schemas.ensure_entity::<ArenaTeam>()?;

        Ok(Self {
            schemas,
            source,
            config,
        })
    }

    /// Look up a character.
    ///
    /// # Errors
    /// `Fetch`/`Parse` from the document source, `Materialization` when a
    /// required field is missing from the character sheet.
    pub fn find_character(
        &self,
        location: &str,
        realm: &str,
        name: &str,
    ) -> Result<Character, ArmoryError> {
        let schema = self.schemas.schema_for(Character::NAME)?;
        let url = self.url_for(location, realm, name, &schema.file)?;
        let document = self.source.fetch_and_parse(&url)?;

        let context = identity_context(location, realm, name);
        let mut character: Character =
            Materializer::new(&self.schemas).materialize_entity(&document, &context)?;
        character.location = location.to_string();

        tracing::debug!(character = %character.full_name(), realm = %character.realm, "character found");
        Ok(character)
    }

    /// Fetch and materialize the arena teams of a character.
    ///
    /// Each bracket is extracted only when the presence selector matches for
    /// its size; other brackets stay empty.
    pub(crate) fn load_arena_teams(
        &self,
        location: &str,
        realm: &str,
        name: &str,
    ) -> Result<ArenaTeams, ArmoryError> {
        let schema = self.schemas.schema_for(ArenaTeam::NAME)?;
        let url = self.url_for(location, realm, name, &schema.file)?;
        let document = self.source.fetch_and_parse(&url)?;
        let materializer = Materializer::new(&self.schemas);

        let mut teams = ArenaTeams::default();

        for size in TeamSize::ALL {
            let context = identity_context(location, realm, name).with_value("size", size.players());

            let present = match &schema.presence {
                Some(presence) => has_match(&document, presence, &context)
                    .map_err(|source| ArmoryError::Materialization {
                        entity: ArenaTeam::NAME.to_string(),
                        field: "presence".to_string(),
                        source,
                    })?,
                None => true,
            };

            if !present {
                tracing::debug!(size = size.players(), "no arena team in bracket");
                continue;
            }

            let team: ArenaTeam = materializer.materialize_entity(&document, &context)?;
            teams.set(size, team);
        }

        Ok(teams)
    }

    /// URL of `file` for a character, honouring a configured base URL.
    pub fn url_for(
        &self,
        location: &str,
        realm: &str,
        name: &str,
        file: &str,
    ) -> Result<String, ArmoryError> {
        self.config.url_for(location, realm, name, file)
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &ArmoryConfig {
        &self.config
    }
}

fn identity_context(location: &str, realm: &str, name: &str) -> DocumentContext {
    DocumentContext::empty()
        .with_value("location", location)
        .with_value("realm", realm)
        .with_value("name", name)
}

fn has_match(
    document: &dyn Extractor,
    selector: &str,
    context: &DocumentContext,
) -> Result<bool, EvalError> {
    let selector = substitute(selector, context)?;
    Ok(document.count(&selector)? > 0)
}
