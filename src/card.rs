use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::database::{Database, DatabaseError};
use crate::julian::JulianDate;
use crate::models::{Card, CardKind, Grade, Review};
use crate::scheduler::{self, Schedule};

#[derive(Debug, Error)]
pub enum CardError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Field '{0}' cannot be changed")]
    ImmutableField(String),
    #[error("Field '{0}' does not exist")]
    UnknownField(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CardError {
    /// Bad input rather than a failed store write
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CardError::DatabaseError(_))
    }
}

/// Whether postponing a card leaves a row in the review log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostponePolicy {
    /// Only the due date moves
    #[default]
    Silent,
    /// Also log a `postpone` review (zero seconds) for the audit trail
    Logged,
}

/// Card columns that may be written directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    FrontText,
    BackText,
    FrontImage,
    BackImage,
    FrontAudio,
    BackAudio,
    Deleted,
}

impl CardField {
    pub fn column(self) -> &'static str {
        match self {
            CardField::FrontText => "front_text",
            CardField::BackText => "back_text",
            CardField::FrontImage => "front_image",
            CardField::BackImage => "back_image",
            CardField::FrontAudio => "front_audio",
            CardField::BackAudio => "back_audio",
            CardField::Deleted => "deleted",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, CardField::FrontText | CardField::BackText)
    }

    pub fn is_blob(self) -> bool {
        matches!(
            self,
            CardField::FrontImage | CardField::BackImage | CardField::FrontAudio | CardField::BackAudio
        )
    }

    /// Interpret a command-line value for this field. For media fields an
    /// existing file path is replaced by the file's contents.
    pub fn parse_value(self, raw: &str) -> Result<FieldValue, CardError> {
        let path = Path::new(raw);
        let is_file = !raw.is_empty() && path.is_file();

        if self.is_text() {
            if is_file {
                let text = std::fs::read_to_string(path).map_err(|source| CardError::ReadError {
                    path: raw.to_string(),
                    source,
                })?;
                return Ok(FieldValue::Text(text));
            }
            return Ok(FieldValue::Text(raw.to_string()));
        }

        if self.is_blob() {
            if !is_file {
                return Err(CardError::InvalidValue {
                    field: self.column(),
                    reason: format!("'{}' is not a file", raw),
                });
            }
            let bytes = std::fs::read(path).map_err(|source| CardError::ReadError {
                path: raw.to_string(),
                source,
            })?;
            return Ok(FieldValue::Blob(bytes));
        }

        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(FieldValue::Flag(true)),
            "false" | "0" | "no" => Ok(FieldValue::Flag(false)),
            _ => Err(CardError::InvalidValue {
                field: self.column(),
                reason: format!("expected true or false, got '{}'", raw),
            }),
        }
    }
}

impl FromStr for CardField {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front_text" => Ok(CardField::FrontText),
            "back_text" => Ok(CardField::BackText),
            "front_image" => Ok(CardField::FrontImage),
            "back_image" => Ok(CardField::BackImage),
            "front_audio" => Ok(CardField::FrontAudio),
            "back_audio" => Ok(CardField::BackAudio),
            "deleted" => Ok(CardField::Deleted),
            // identity, presentation kind and schedule are never set by hand
            "id" | "verses" | "create_date" | "due_date" => Err(CardError::ImmutableField(s.to_string())),
            other => Err(CardError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Blob(Vec<u8>),
    Flag(bool),
}

/// Insert a new card dated `today`, log its creation and schedule it
pub fn create_card(db: &Database, kind: CardKind, today: JulianDate) -> Result<Card, CardError> {
    let id = db.insert_card(today, kind)?;
    let mut card = db.get_card(id)?;
    card.record_review(db, Grade::Create, 0, today)?;
    log::info!("created {:?} card {}", kind, id);
    Ok(card)
}

impl Card {
    /// Write one field through to the store, then update the in-memory copy
    pub fn set_field(&mut self, db: &Database, field: CardField, value: FieldValue) -> Result<(), CardError> {
        match (field, value) {
            (CardField::FrontText, FieldValue::Text(text)) => {
                db.update_card_column(self.id, field.column(), &text)?;
                self.front_text = text;
            }
            (CardField::BackText, FieldValue::Text(text)) => {
                db.update_card_column(self.id, field.column(), &text)?;
                self.back_text = text;
            }
            (CardField::FrontImage, FieldValue::Blob(bytes)) => {
                db.update_card_column(self.id, field.column(), &bytes)?;
                self.front_image = Some(bytes);
            }
            (CardField::BackImage, FieldValue::Blob(bytes)) => {
                db.update_card_column(self.id, field.column(), &bytes)?;
                self.back_image = Some(bytes);
            }
            (CardField::FrontAudio, FieldValue::Blob(bytes)) => {
                db.update_card_column(self.id, field.column(), &bytes)?;
                self.front_audio = Some(bytes);
            }
            (CardField::BackAudio, FieldValue::Blob(bytes)) => {
                db.update_card_column(self.id, field.column(), &bytes)?;
                self.back_audio = Some(bytes);
            }
            (CardField::Deleted, FieldValue::Flag(flag)) => {
                db.update_card_column(self.id, field.column(), &flag)?;
                self.deleted = flag;
            }
            (field, value) => {
                return Err(CardError::InvalidValue {
                    field: field.column(),
                    reason: format!("mismatched value {:?}", value),
                });
            }
        }
        Ok(())
    }

    pub fn set_front_text(&mut self, db: &Database, text: String) -> Result<(), CardError> {
        self.set_field(db, CardField::FrontText, FieldValue::Text(text))
    }

    pub fn set_back_text(&mut self, db: &Database, text: String) -> Result<(), CardError> {
        self.set_field(db, CardField::BackText, FieldValue::Text(text))
    }

    pub fn set_deleted(&mut self, db: &Database, deleted: bool) -> Result<(), CardError> {
        self.set_field(db, CardField::Deleted, FieldValue::Flag(deleted))
    }

    pub fn toggle_deleted(&mut self, db: &Database) -> Result<(), CardError> {
        self.set_deleted(db, !self.deleted)
    }

    pub fn reviews(&self, db: &Database) -> Result<Vec<Review>, CardError> {
        Ok(db.get_reviews(self.id)?)
    }

    pub fn tags(&self, db: &Database) -> Result<Vec<String>, CardError> {
        Ok(db.get_tags(self.id)?)
    }

    pub fn add_tag(&self, db: &Database, tag: &str) -> Result<(), CardError> {
        Ok(db.add_tag(self.id, tag)?)
    }

    pub fn remove_tag(&self, db: &Database, tag: &str) -> Result<(), CardError> {
        Ok(db.remove_tag(self.id, tag)?)
    }

    pub fn replace_tags(&self, db: &Database, tags: &[String]) -> Result<(), CardError> {
        Ok(db.replace_tags(self.id, tags)?)
    }

    /// Derived scheduling state, without touching the stored due date
    pub fn schedule_info(&self, db: &Database) -> Result<Schedule, CardError> {
        let reviews = self.reviews(db)?;
        Ok(scheduler::schedule(self.create_date, &reviews))
    }

    /// Recompute the due date from the review log and write it through
    pub fn schedule(&mut self, db: &Database) -> Result<Schedule, CardError> {
        let schedule = self.schedule_info(db)?;
        db.update_card_column(self.id, "due_date", &schedule.due_date)?;
        self.due_date = schedule.due_date;
        Ok(schedule)
    }

    /// Append one review row; scheduling grades also move the due date
    pub fn record_review(
        &mut self,
        db: &Database,
        grade: Grade,
        seconds: i64,
        today: JulianDate,
    ) -> Result<(), CardError> {
        db.insert_review(&Review::new(self.id, today, seconds, grade))?;
        log::debug!("card {}: logged {} ({}s)", self.id, grade, seconds);
        if grade.schedules() {
            self.schedule(db)?;
        }
        Ok(())
    }

    /// Make the card due `days` after today, bypassing the scheduler
    pub fn postpone(
        &mut self,
        db: &Database,
        today: JulianDate,
        days: i64,
        policy: PostponePolicy,
    ) -> Result<JulianDate, CardError> {
        let due = scheduler::postponed_due_date(self.due_date, today, days).ok_or_else(|| {
            CardError::InvalidValue {
                field: "due_date",
                reason: format!("cannot postpone by {} days", days),
            }
        })?;
        db.update_card_column(self.id, "due_date", &due)?;
        self.due_date = due;
        if policy == PostponePolicy::Logged {
            db.insert_review(&Review::new(self.id, today, 0, Grade::Postpone))?;
        }
        log::info!("card {}: postponed until {}", self.id, due);
        Ok(due)
    }

    /// Everything worth showing about a card, for `info`
    pub fn info(&self, db: &Database) -> Result<CardInfo, CardError> {
        Ok(CardInfo {
            card: self.clone(),
            tags: self.tags(db)?,
            schedule: self.schedule_info(db)?,
            reviews: self.reviews(db)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CardInfo {
    #[serde(flatten)]
    pub card: Card,
    pub tags: Vec<String>,
    pub schedule: Schedule,
    pub reviews: Vec<Review>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: i64) -> JulianDate {
        JulianDate::from_day(d)
    }

    #[test]
    fn test_create_logs_and_schedules() {
        let db = Database::open_in_memory().unwrap();
        let card = create_card(&db, CardKind::Basic, day(100)).unwrap();
        assert_eq!(card.due_date, day(100));

        let reviews = card.reviews(&db).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].grade, Grade::Create);
    }

    #[test]
    fn test_good_review_moves_due_date() {
        let db = Database::open_in_memory().unwrap();
        let mut card = create_card(&db, CardKind::Basic, day(100)).unwrap();
        card.record_review(&db, Grade::Good, 12, day(105)).unwrap();

        assert_eq!(card.due_date, day(110));
        assert_eq!(db.get_card(card.id).unwrap().due_date, day(110));
    }

    #[test]
    fn test_preview_and_exit_leave_due_date_alone() {
        let db = Database::open_in_memory().unwrap();
        let mut card = create_card(&db, CardKind::Basic, day(100)).unwrap();
        card.record_review(&db, Grade::Good, 5, day(104)).unwrap();
        let due = card.due_date;

        card.record_review(&db, Grade::Preview, 3, day(120)).unwrap();
        card.record_review(&db, Grade::Exit, 1, day(121)).unwrap();

        assert_eq!(db.get_card(card.id).unwrap().due_date, due);
        assert_eq!(card.reviews(&db).unwrap().len(), 4);
    }

    #[test]
    fn test_postpone_policies() {
        let db = Database::open_in_memory().unwrap();
        let mut card = create_card(&db, CardKind::Basic, day(100)).unwrap();
        db.update_card_column(card.id, "due_date", &JulianDate::new(100.25)).unwrap();
        card.due_date = JulianDate::new(100.25);

        let due = card.postpone(&db, day(150), 2, PostponePolicy::Silent).unwrap();
        assert_eq!(due, JulianDate::new(152.25));
        assert_eq!(card.reviews(&db).unwrap().len(), 1);

        card.postpone(&db, day(150), 1, PostponePolicy::Logged).unwrap();
        let reviews = card.reviews(&db).unwrap();
        assert_eq!(reviews.last().map(|r| r.grade), Some(Grade::Postpone));
        assert_eq!(db.get_card(card.id).unwrap().due_date, JulianDate::new(151.25));
    }

    #[test]
    fn test_postpone_out_of_range_leaves_card_alone() {
        let db = Database::open_in_memory().unwrap();
        let mut card = create_card(&db, CardKind::Basic, day(100)).unwrap();

        let result = card.postpone(&db, day(100), i64::MAX, PostponePolicy::Logged);
        assert!(matches!(result, Err(CardError::InvalidValue { field: "due_date", .. })));
        assert_eq!(card.due_date, day(100));
        assert_eq!(db.get_card(card.id).unwrap().due_date, day(100));
        assert_eq!(card.reviews(&db).unwrap().len(), 1);
    }

    #[test]
    fn test_identity_fields_are_rejected() {
        for name in ["id", "verses", "due_date", "create_date"] {
            assert!(matches!(name.parse::<CardField>(), Err(CardError::ImmutableField(_))));
        }
        assert!(matches!("colour".parse::<CardField>(), Err(CardError::UnknownField(_))));
    }

    #[test]
    fn test_set_field_writes_through() {
        let db = Database::open_in_memory().unwrap();
        let mut card = create_card(&db, CardKind::Basic, day(1)).unwrap();

        card.set_front_text(&db, "capital of Peru".to_string()).unwrap();
        let value = CardField::Deleted.parse_value("yes").unwrap();
        card.set_field(&db, CardField::Deleted, value).unwrap();

        let stored = db.get_card(card.id).unwrap();
        assert_eq!(stored.front_text, "capital of Peru");
        assert!(stored.deleted);
    }

    #[test]
    fn test_media_values_are_loaded_from_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("answer.txt");
        std::fs::write(&path, "Lima").unwrap();

        let value = CardField::BackText.parse_value(path.to_str().unwrap()).unwrap();
        assert_eq!(value, FieldValue::Text("Lima".to_string()));

        assert!(matches!(
            CardField::FrontImage.parse_value("no/such/file.png"),
            Err(CardError::InvalidValue { .. })
        ));
        assert!(matches!(
            CardField::Deleted.parse_value("maybe"),
            Err(CardError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_mismatched_value_is_rejected_before_write() {
        let db = Database::open_in_memory().unwrap();
        let mut card = create_card(&db, CardKind::Basic, day(1)).unwrap();
        let result = card.set_field(&db, CardField::FrontText, FieldValue::Flag(true));
        assert!(matches!(result, Err(CardError::InvalidValue { .. })));
        assert_eq!(db.get_card(card.id).unwrap().front_text, "");
    }
}
