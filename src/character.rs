//! Character and arena team records.
//!
//! ## Example
//!
//! ```ignore
//! use armory_scrape::Armory;
//!
//! let armory = Armory::from_env()?;
//! let mut character = armory.find_character("eu", "Aszune", "Adries")?;
//!
//! println!("{}", character.full_name());   // "Adries the Explorer"
//! println!("{}", character.description()); // "Level 48 Human Warrior"
//!
//! if let Some(team) = &character.arena_teams(&armory)?.two_player {
//!     println!("{} ({})", team.name, team.season_record());
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::Armory;
use crate::entity::{Entity, EntityInstance, ValueType};
use crate::error::ArmoryError;
use crate::source::DocumentSource;

/// A World of Warcraft character as shown on its Armory character sheet.
#[derive(Debug, Clone, Serialize)]
pub struct Character {
    /// Region the character was looked up in, e.g. `eu` or `us`
    pub location: String,
    pub name: String,
    /// Title shown before the name, e.g. "Private ". Empty when none.
    pub prefix: String,
    /// Title shown after the name, e.g. " the Explorer". Empty when none.
    pub suffix: String,
    pub level: i64,
    pub faction: String,
    pub faction_id: i64,
    pub race: String,
    pub race_id: i64,
    pub class_name: String,
    pub class_id: i64,
    pub gender: String,
    pub gender_id: i64,
    /// Achievement points
    pub points: i64,
    /// When the Armory last refreshed this character
    pub last_modified: DateTime<Utc>,
    /// Official realm name, e.g. "Aszune"
    pub realm: String,
    pub battle_group: String,
    /// Empty when the character is not in a guild
    pub guild_name: String,
    #[serde(skip)]
    arena_teams: ArenaTeamsState,
}

impl Character {
    /// Name including prefix and suffix.
    pub fn full_name(&self) -> String {
        [self.prefix.as_str(), self.name.as_str(), self.suffix.as_str()].concat()
    }

    /// The usual in-game description, e.g. "Level 80 Night Elf Hunter".
    pub fn description(&self) -> String {
        format!("Level {} {} {}", self.level, self.race, self.class_name)
    }

    /// Arena teams of this character, fetched on first call and cached.
    ///
    /// Later calls return a copy of the cached teams without fetching. A
    /// failed load leaves the cache empty, so the next call fetches again.
    pub fn arena_teams<S: DocumentSource>(
        &mut self,
        armory: &Armory<S>,
    ) -> Result<ArenaTeams, ArmoryError> {
        self.arena_teams
            .get_or_try_load(|| armory.load_arena_teams(&self.location, &self.realm, &self.name))
    }

    pub fn arena_teams_state(&self) -> &ArenaTeamsState {
        &self.arena_teams
    }
}

impl Entity for Character {
    const NAME: &'static str = "character";
    const FIELDS: &'static [(&'static str, ValueType)] = &[
        ("name", ValueType::String),
        ("prefix", ValueType::String),
        ("suffix", ValueType::String),
        ("level", ValueType::Integer),
        ("faction", ValueType::String),
        ("faction_id", ValueType::Integer),
        ("race", ValueType::String),
        ("race_id", ValueType::Integer),
        ("class_name", ValueType::String),
        ("class_id", ValueType::Integer),
        ("gender", ValueType::String),
        ("gender_id", ValueType::Integer),
        ("points", ValueType::Integer),
        ("last_modified", ValueType::Timestamp),
        ("realm", ValueType::String),
        ("battle_group", ValueType::String),
        ("guild_name", ValueType::String),
    ];

    fn from_instance(instance: &EntityInstance) -> Self {
        Character {
            location: String::new(),
            name: instance.string("name"),
            prefix: instance.string("prefix"),
            suffix: instance.string("suffix"),
            level: instance.integer("level"),
            faction: instance.string("faction"),
            faction_id: instance.integer("faction_id"),
            race: instance.string("race"),
            race_id: instance.integer("race_id"),
            class_name: instance.string("class_name"),
            class_id: instance.integer("class_id"),
            gender: instance.string("gender"),
            gender_id: instance.integer("gender_id"),
            points: instance.integer("points"),
            last_modified: instance.timestamp("last_modified"),
            realm: instance.string("realm"),
            battle_group: instance.string("battle_group"),
            guild_name: instance.string("guild_name"),
            arena_teams: ArenaTeamsState::Unloaded,
        }
    }
}

/// An arena team a character plays in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArenaTeam {
    pub name: String,
    /// Current rating, 0 to 3000
    pub rating: i64,
    /// Battlegroup ranking
    pub ranking: i64,
    pub season_games_played: i64,
    pub season_games_won: i64,
    pub games_played: i64,
    pub games_won: i64,
    /// Final ranking of the previous arena season
    pub last_season_ranking: i64,
    /// Number of members on the team
    pub size: i64,
    /// Bracket the team plays in: 2, 3 or 5
    pub team_size: i64,
    pub battle_group: String,
    pub faction_id: i64,
    pub faction: String,
    pub realm: String,
    /// Creation time, as reported by the Armory
    pub created: String,
}

impl ArenaTeam {
    /// Season record as "won / played".
    pub fn season_record(&self) -> String {
        format!("{} / {}", self.season_games_won, self.season_games_played)
    }

    /// Whole-number share of season games won. Zero when no games were played.
    pub fn season_win_percentage(&self) -> i64 {
        if self.season_games_played == 0 {
            return 0;
        }
        let percentage = i128::from(self.season_games_won) * 100 / i128::from(self.season_games_played);
        percentage.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

impl Entity for ArenaTeam {
    const NAME: &'static str = "arena_team";
    const FIELDS: &'static [(&'static str, ValueType)] = &[
        ("name", ValueType::String),
        ("rating", ValueType::Integer),
        ("ranking", ValueType::Integer),
        ("season_games_played", ValueType::Integer),
        ("season_games_won", ValueType::Integer),
        ("games_played", ValueType::Integer),
        ("games_won", ValueType::Integer),
        ("last_season_ranking", ValueType::Integer),
        ("size", ValueType::Integer),
        ("team_size", ValueType::Integer),
        ("battle_group", ValueType::String),
        ("faction_id", ValueType::Integer),
        ("faction", ValueType::String),
        ("realm", ValueType::String),
        ("created", ValueType::String),
    ];

    fn from_instance(instance: &EntityInstance) -> Self {
        ArenaTeam {
            name: instance.string("name"),
            rating: instance.integer("rating"),
            ranking: instance.integer("ranking"),
            season_games_played: instance.integer("season_games_played"),
            season_games_won: instance.integer("season_games_won"),
            games_played: instance.integer("games_played"),
            games_won: instance.integer("games_won"),
            last_season_ranking: instance.integer("last_season_ranking"),
            size: instance.integer("size"),
            team_size: instance.integer("team_size"),
            battle_group: instance.string("battle_group"),
            faction_id: instance.integer("faction_id"),
            faction: instance.string("faction"),
            realm: instance.string("realm"),
            created: instance.string("created"),
        }
    }
}

/// Arena bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamSize {
    Two,
    Three,
    Five,
}

impl TeamSize {
    pub const ALL: [TeamSize; 3] = [TeamSize::Two, TeamSize::Three, TeamSize::Five];

    /// Players per side.
    pub fn players(self) -> u8 {
        match self {
            TeamSize::Two => 2,
            TeamSize::Three => 3,
            TeamSize::Five => 5,
        }
    }
}

/// A character's arena teams, at most one per bracket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArenaTeams {
    pub two_player: Option<ArenaTeam>,
    pub three_player: Option<ArenaTeam>,
    pub five_player: Option<ArenaTeam>,
}

impl ArenaTeams {
    pub fn get(&self, size: TeamSize) -> Option<&ArenaTeam> {
        match size {
            TeamSize::Two => self.two_player.as_ref(),
            TeamSize::Three => self.three_player.as_ref(),
            TeamSize::Five => self.five_player.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, size: TeamSize, team: ArenaTeam) {
        let slot = match size {
            TeamSize::Two => &mut self.two_player,
            TeamSize::Three => &mut self.three_player,
            TeamSize::Five => &mut self.five_player,
        };
        *slot = Some(team);
    }

    /// Present teams, smallest bracket first.
    pub fn iter(&self) -> impl Iterator<Item = (TeamSize, &ArenaTeam)> {
        TeamSize::ALL
            .into_iter()
            .filter_map(move |size| self.get(size).map(|team| (size, team)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Load state of a character's arena teams.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ArenaTeamsState {
    #[default]
    Unloaded,
    Loading,
    Loaded(ArenaTeams),
}

impl ArenaTeamsState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ArenaTeamsState::Loaded(_))
    }

    /// The cached teams, if loaded.
    pub fn teams(&self) -> Option<&ArenaTeams> {
        match self {
            ArenaTeamsState::Loaded(teams) => Some(teams),
            ArenaTeamsState::Unloaded | ArenaTeamsState::Loading => None,
        }
    }

    /// Return the cached teams, running `load` first unless already loaded.
    fn get_or_try_load<F>(&mut self, load: F) -> Result<ArenaTeams, ArmoryError>
    where
        F: FnOnce() -> Result<ArenaTeams, ArmoryError>,
    {
        match self {
            ArenaTeamsState::Loaded(teams) => {
                tracing::debug!("arena teams served from cache");
                Ok(teams.clone())
            }
            state => {
                *state = ArenaTeamsState::Loading;
                match load() {
                    Ok(teams) => {
                        *state = ArenaTeamsState::Loaded(teams.clone());
                        Ok(teams)
                    }
                    Err(e) => {
                        *state = ArenaTeamsState::Unloaded;
                        Err(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldValue;

    fn character(prefix: &str, name: &str, suffix: &str) -> Character {
        let mut instance = EntityInstance::new("character");
        instance.set("name", FieldValue::String(name.to_string()));
        instance.set("prefix", FieldValue::String(prefix.to_string()));
        instance.set("suffix", FieldValue::String(suffix.to_string()));
        instance.set("level", FieldValue::Integer(48));
        instance.set("race", FieldValue::String("Human".to_string()));
        instance.set("class_name", FieldValue::String("Warrior".to_string()));
        Character::from_instance(&instance)
    }

    fn team(won: i64, played: i64) -> ArenaTeam {
        let mut instance = EntityInstance::new("arena_team");
        instance.set("name", FieldValue::String("Orange Team".to_string()));
        instance.set("season_games_won", FieldValue::Integer(won));
        instance.set("season_games_played", FieldValue::Integer(played));
        ArenaTeam::from_instance(&instance)
    }

    #[test]
    fn test_full_name_combinations() {
        let cases = [
            ("", "Adries", "", "Adries"),
            ("Private ", "Adries", "", "Private Adries"),
            ("", "Adries", " the Explorer", "Adries the Explorer"),
            ("Private ", "Adries", " the Explorer", "Private Adries the Explorer"),
        ];

        for (prefix, name, suffix, expected) in cases {
            let c = character(prefix, name, suffix);
            assert_eq!(c.full_name(), expected);
            assert_eq!(c.full_name(), format!("{}{}{}", c.prefix, c.name, c.suffix));
        }
    }

    #[test]
    fn test_description() {
        assert_eq!(character("", "Adries", "").description(), "Level 48 Human Warrior");
    }

    #[test]
    fn test_season_record() {
        assert_eq!(team(5, 12).season_record(), "5 / 12");
    }

    #[test]
    fn test_win_percentage_zero_games() {
        assert_eq!(team(0, 0).season_win_percentage(), 0);
        assert_eq!(team(7, 0).season_win_percentage(), 0);
    }

    #[test]
    fn test_win_percentage_truncates() {
        assert_eq!(team(1, 3).season_win_percentage(), 33);
        assert_eq!(team(2, 3).season_win_percentage(), 66);
        assert_eq!(team(29, 100).season_win_percentage(), 29);
        assert_eq!(team(10, 10).season_win_percentage(), 100);
    }

    #[test]
    fn test_win_percentage_large_counts() {
        let huge = team(100_000_000_000_000_000, 200_000_000_000_000_000);
        assert_eq!(huge.season_win_percentage(), 50);

        assert_eq!(team(i64::MAX, i64::MAX).season_win_percentage(), 100);
        assert_eq!(team(i64::MAX, 1).season_win_percentage(), i64::MAX);
    }

    #[test]
    fn test_arena_teams_slots() {
        let mut teams = ArenaTeams::default();
        assert!(teams.is_empty());

        teams.set(TeamSize::Five, team(1, 2));
        assert!(teams.get(TeamSize::Two).is_none());
        assert!(teams.get(TeamSize::Five).is_some());

        let sizes: Vec<u8> = teams.iter().map(|(size, _)| size.players()).collect();
        assert_eq!(sizes, vec![5]);
    }

    #[test]
    fn test_state_loads_once() {
        let mut state = ArenaTeamsState::default();
        let mut calls = 0;

        for _ in 0..3 {
            let teams = state
                .get_or_try_load(|| {
                    calls += 1;
                    Ok(ArenaTeams::default())
                })
                .unwrap();
            assert!(teams.is_empty());
        }

        assert_eq!(calls, 1);
        assert!(state.is_loaded());
        assert_eq!(state.teams(), Some(&ArenaTeams::default()));
    }

    #[test]
    fn test_state_failure_returns_to_unloaded() {
        let mut state = ArenaTeamsState::default();

        let result = state.get_or_try_load(|| Err(ArmoryError::fetch("http://x/", "boom")));
        assert!(result.is_err());
        assert_eq!(state, ArenaTeamsState::Unloaded);
        assert_eq!(state.teams(), None);

        assert!(state.get_or_try_load(|| Ok(ArenaTeams::default())).is_ok());
        assert!(state.is_loaded());
    }
}
