//! armory CLI - look up characters on the World of Warcraft Armory
//!
//! Fetches a character sheet (and optionally arena teams) and prints the
//! extracted record, or checks a schema file without touching the network.

use armory_scrape::{ArenaTeam, Armory, ArmoryConfig, Character, Entity, SchemaRegistry};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "armory")]
#[command(version, about = "Schema-driven World of Warcraft Armory lookups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a character
    Character {
        /// Region, e.g. us or eu
        location: String,

        /// Realm name, e.g. "Argent Dawn"
        realm: String,

        /// Character name
        name: String,

        /// Also fetch the character's arena teams
        #[arg(short, long)]
        arena_teams: bool,

        /// Print the record as JSON
        #[arg(short, long)]
        json: bool,

        /// Schema file (defaults to ARMORY_SCHEMA, then the embedded schema)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Validate a schema file without fetching anything
    Validate {
        /// Schema file (defaults to ARMORY_SCHEMA, then the embedded schema)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Print the Armory URL for a character page (honours ARMORY_BASE_URL)
    Url {
        location: String,
        realm: String,
        name: String,

        /// Page to address
        #[arg(short, long, default_value = "character-sheet.xml")]
        file: String,
    },
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Character {
            location,
            realm,
            name,
            arena_teams,
            json,
            schema,
        } => show_character(&location, &realm, &name, arena_teams, json, schema),
        Commands::Validate { schema } => validate_schema(schema),
        Commands::Url {
            location,
            realm,
            name,
            file,
        } => ArmoryConfig::default()
            .url_for(&location, &realm, &name, &file)
            .map(|url| println!("{}", url))
            .map_err(|e| e.to_string()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_schemas(schema: Option<PathBuf>) -> Result<SchemaRegistry, String> {
    let path = schema.or_else(|| {
        std::env::var("ARMORY_SCHEMA")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    });

    match path {
        Some(path) => SchemaRegistry::load_from_file(&path)
            .map_err(|e| format!("{}: {}", path.display(), e)),
        None => SchemaRegistry::builtin().map_err(|e| e.to_string()),
    }
}

#[derive(Serialize)]
struct CharacterReport<'a> {
    #[serde(flatten)]
    character: &'a Character,
    #[serde(skip_serializing_if = "Option::is_none")]
    arena_teams: Option<Vec<&'a ArenaTeam>>,
}

fn show_character(
    location: &str,
    realm: &str,
    name: &str,
    with_arena_teams: bool,
    json: bool,
    schema: Option<PathBuf>,
) -> Result<(), String> {
    let schemas = load_schemas(schema)?;
    let armory = Armory::new(schemas, ArmoryConfig::default()).map_err(|e| e.to_string())?;

    let mut character = armory
        .find_character(location, realm, name)
        .map_err(|e| e.to_string())?;

    let teams = if with_arena_teams {
        Some(character.arena_teams(&armory).map_err(|e| e.to_string())?)
    } else {
        None
    };

    if json {
        let report = CharacterReport {
            character: &character,
            arena_teams: teams
                .as_ref()
                .map(|teams| teams.iter().map(|(_, team)| team).collect()),
        };
        let output = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", output);
        return Ok(());
    }

    println!("{}", character.full_name());
    println!("  {}", character.description());
    println!("  {} ({}, {})", character.realm, character.battle_group, character.faction);
    if !character.guild_name.is_empty() {
        println!("  <{}>", character.guild_name);
    }
    println!("  {} achievement points", character.points);
    println!("  Last modified {}", character.last_modified.format("%Y-%m-%d"));

    if let Some(teams) = &teams {
        if teams.is_empty() {
            println!("  No arena teams");
        }
        for (size, team) in teams.iter() {
            println!(
                "  {0}v{0} {1}: rating {2}, season {3} ({4}%)",
                size.players(),
                team.name,
                team.rating,
                team.season_record(),
                team.season_win_percentage()
            );
        }
    }

    Ok(())
}

fn validate_schema(schema: Option<PathBuf>) -> Result<(), String> {
    let registry = load_schemas(schema)?;

    registry
        .ensure_entity::<Character>()
        .map_err(|e| e.to_string())?;
    registry
        .ensure_entity::<ArenaTeam>()
        .map_err(|e| e.to_string())?;

    for name in registry.entity_names() {
        let schema = registry.schema_for(name).map_err(|e| e.to_string())?;
        println!("  ✓ {} ({} fields, {})", name, schema.fields.len(), schema.file);
    }

    println!(
        "✅ Schema is valid for {} and {}",
        Character::NAME,
        ArenaTeam::NAME
    );
    Ok(())
}
