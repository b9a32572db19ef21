use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::julian::JulianDate;

/// Every action that can be written to the review log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Create,
    Again,
    Hard,
    Good,
    Easy,
    Edit,
    Delete,
    Exit,
    Preview,
    Postpone,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Create => "create",
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
            Grade::Edit => "edit",
            Grade::Delete => "delete",
            Grade::Exit => "exit",
            Grade::Preview => "preview",
            Grade::Postpone => "postpone",
        }
    }

    /// Reset actions restart the ease/maturity clock
    pub fn is_reset(self) -> bool {
        matches!(self, Grade::Create | Grade::Again)
    }

    pub fn is_study(self) -> bool {
        matches!(self, Grade::Hard | Grade::Good | Grade::Easy)
    }

    /// Grades after which the scheduler runs
    pub fn schedules(self) -> bool {
        self.is_reset() || self.is_study()
    }

    /// Contribution of a study grade to the ease average
    pub fn ease_points(self) -> Option<f64> {
        match self {
            Grade::Hard => Some(0.0),
            Grade::Good => Some(1.0),
            Grade::Easy => Some(2.0),
            _ => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Grade::Create),
            "again" => Ok(Grade::Again),
            "hard" => Ok(Grade::Hard),
            "good" => Ok(Grade::Good),
            "easy" => Ok(Grade::Easy),
            "edit" => Ok(Grade::Edit),
            "delete" => Ok(Grade::Delete),
            "exit" => Ok(Grade::Exit),
            "preview" => Ok(Grade::Preview),
            "postpone" => Ok(Grade::Postpone),
            other => Err(format!("unknown grade '{}'", other)),
        }
    }
}

impl ToSql for Grade {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Grade {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Presentation variant, fixed when the card is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    /// Question, flip, answer
    Basic,
    /// Progressive line-by-line reveal
    Verses,
}

impl CardKind {
    pub fn from_verses_flag(verses: bool) -> Self {
        if verses { CardKind::Verses } else { CardKind::Basic }
    }

    pub fn is_verses(self) -> bool {
        self == CardKind::Verses
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub id: i64,
    pub create_date: JulianDate,
    pub due_date: JulianDate,
    pub front_text: String,
    pub back_text: String,
    #[serde(skip)]
    pub front_image: Option<Vec<u8>>,
    #[serde(skip)]
    pub back_image: Option<Vec<u8>>,
    #[serde(skip)]
    pub front_audio: Option<Vec<u8>>,
    #[serde(skip)]
    pub back_audio: Option<Vec<u8>>,
    pub deleted: bool,
    pub kind: CardKind,
}

impl Card {
    /// A card is due when its due date falls on or before `today`
    pub fn is_due(&self, today: JulianDate) -> bool {
        self.due_date.day() <= today.day()
    }

    /// One-line "front | back" rendering used by lists
    pub fn summary(&self) -> String {
        format!(
            "{} | {}",
            self.front_text.replace('\n', " / "),
            self.back_text.replace('\n', " / ")
        )
    }
}

/// One immutable row of the review log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub card_id: i64,
    pub date: JulianDate,
    pub seconds: i64,
    pub grade: Grade,
}

impl Review {
    pub fn new(card_id: i64, date: JulianDate, seconds: i64, grade: Grade) -> Self {
        Self { card_id, date, seconds, grade }
    }
}
