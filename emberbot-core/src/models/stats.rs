// emberbot-core/src/models/stats.rs

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The fixed set of stat counters a user can hold.
///
/// User-supplied text is parsed into this enum before it goes anywhere near
/// a query; only `as_str()` of a parsed value is ever interpolated into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatColumn {
    Strength,
    Intelligence,
    Charisma,
    Luck,
    Dexterity,
    Vigor,
}

impl StatColumn {
    pub const ALL: [StatColumn; 6] = [
        StatColumn::Strength,
        StatColumn::Intelligence,
        StatColumn::Charisma,
        StatColumn::Luck,
        StatColumn::Dexterity,
        StatColumn::Vigor,
    ];

    /// The SQL column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatColumn::Strength => "strength",
            StatColumn::Intelligence => "intelligence",
            StatColumn::Charisma => "charisma",
            StatColumn::Luck => "luck",
            StatColumn::Dexterity => "dexterity",
            StatColumn::Vigor => "vigor",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            StatColumn::Strength => "Strength",
            StatColumn::Intelligence => "Intelligence",
            StatColumn::Charisma => "Charisma",
            StatColumn::Luck => "Luck",
            StatColumn::Dexterity => "Dexterity",
            StatColumn::Vigor => "Vigor",
        }
    }

    pub fn abbrev(&self) -> &'static str {
        match self {
            StatColumn::Strength => "STR",
            StatColumn::Intelligence => "INT",
            StatColumn::Charisma => "CHA",
            StatColumn::Luck => "LUCK",
            StatColumn::Dexterity => "DEX",
            StatColumn::Vigor => "VIG",
        }
    }
}

impl fmt::Display for StatColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatColumn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strength" => Ok(StatColumn::Strength),
            "intelligence" => Ok(StatColumn::Intelligence),
            "charisma" => Ok(StatColumn::Charisma),
            "luck" => Ok(StatColumn::Luck),
            "dexterity" => Ok(StatColumn::Dexterity),
            "vigor" => Ok(StatColumn::Vigor),
            other => Err(Error::Parse(format!("invalid stat column: {other}"))),
        }
    }
}

/// One user's stat record. Rows are created lazily with zeroed counters the
/// first time any operation touches the user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Stats {
    pub user_id: String,
    pub username: String,
    pub strength: i64,
    pub intelligence: i64,
    pub charisma: i64,
    pub luck: i64,
    pub dexterity: i64,
    pub vigor: i64,
}

impl Stats {
    pub fn value(&self, column: StatColumn) -> i64 {
        match column {
            StatColumn::Strength => self.strength,
            StatColumn::Intelligence => self.intelligence,
            StatColumn::Charisma => self.charisma,
            StatColumn::Luck => self.luck,
            StatColumn::Dexterity => self.dexterity,
            StatColumn::Vigor => self.vigor,
        }
    }

    /// The one-line chat rendering of a stat record.
    pub fn format_line(&self, username: &str) -> String {
        let parts: Vec<String> = StatColumn::ALL
            .iter()
            .map(|c| format!("{}: {}", c.abbrev(), self.value(*c)))
            .collect();
        format!("{}'s stats: {}", username, parts.join(" | "))
    }
}

/// Top holder of a single stat column.
#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub column: StatColumn,
    pub username: String,
    pub value: i64,
}
