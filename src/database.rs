use rusqlite::{Connection, OptionalExtension, ToSql};
use std::path::PathBuf;
use thiserror::Error;

use crate::julian::JulianDate;
use crate::models::{Card, CardKind, Review};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Card {0} does not exist")]
    MissingCard(i64),
}

/// Column list shared by every statement that materializes a [`Card`]
pub const CARD_COLUMNS: &str = "cards.id, cards.create_date, cards.due_date, cards.front_text, \
     cards.back_text, cards.front_image, cards.back_image, cards.front_audio, cards.back_audio, \
     cards.deleted, cards.verses";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        log::debug!("opened card store at {}", db_path.display());

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a private in-memory store (used by tests)
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database { conn: Connection::open_in_memory()? };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS cards (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                create_date     REAL NOT NULL,
                due_date        REAL NOT NULL,
                front_text      TEXT NOT NULL DEFAULT '',
                back_text       TEXT NOT NULL DEFAULT '',
                front_image     BLOB,
                back_image      BLOB,
                front_audio     BLOB,
                back_audio      BLOB,
                deleted         INTEGER NOT NULL DEFAULT 0,
                verses          INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS reviews (
                card_id         INTEGER NOT NULL,
                date            REAL NOT NULL,
                seconds         INTEGER NOT NULL DEFAULT 0,
                action_grade    TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tags (
                card_id         INTEGER NOT NULL,
                tag             TEXT NOT NULL,
                UNIQUE (card_id, tag)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cards_due_date ON cards(due_date)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reviews_card_id ON reviews(card_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag)",
            [],
        )?;

        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Insert an empty card and return its ID
    pub fn insert_card(&self, today: JulianDate, kind: CardKind) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO cards (create_date, due_date, verses) VALUES (?1, ?2, ?3)",
            rusqlite::params![today, today, kind.is_verses()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Helper function to map a row selected with [`CARD_COLUMNS`] to a Card
    pub fn row_to_card(row: &rusqlite::Row) -> Result<Card, rusqlite::Error> {
        Ok(Card {
            id: row.get(0)?,
            create_date: row.get(1)?,
            due_date: row.get(2)?,
            front_text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            back_text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            front_image: row.get(5)?,
            back_image: row.get(6)?,
            front_audio: row.get(7)?,
            back_audio: row.get(8)?,
            deleted: row.get::<_, i64>(9)? != 0,
            kind: CardKind::from_verses_flag(row.get::<_, i64>(10)? != 0),
        })
    }

    /// Get a single card by ID
    pub fn get_card(&self, id: i64) -> Result<Card, DatabaseError> {
        let sql = format!("SELECT {} FROM cards WHERE cards.id = ?1", CARD_COLUMNS);
        self.conn
            .query_row(&sql, rusqlite::params![id], Self::row_to_card)
            .optional()?
            .ok_or(DatabaseError::MissingCard(id))
    }

    /// Write one column of one card. `column` must come from a fixed
    /// whitelist; values always travel as parameters.
    pub fn update_card_column(&self, id: i64, column: &str, value: &dyn ToSql) -> Result<(), DatabaseError> {
        let sql = format!("UPDATE cards SET {} = ?1 WHERE id = ?2", column);
        let changed = self.conn.execute(&sql, rusqlite::params![value, id])?;
        if changed == 0 {
            return Err(DatabaseError::MissingCard(id));
        }
        log::debug!("card {}: wrote {}", id, column);
        Ok(())
    }

    /// Append one row to the review log
    pub fn insert_review(&self, review: &Review) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO reviews (card_id, date, seconds, action_grade) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![review.card_id, review.date, review.seconds, review.grade],
        )?;
        Ok(())
    }

    /// All reviews of a card in log order (date, then insertion order)
    pub fn get_reviews(&self, card_id: i64) -> Result<Vec<Review>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT card_id, date, seconds, action_grade
             FROM reviews WHERE card_id = ?1 ORDER BY date ASC, rowid ASC",
        )?;
        let reviews = stmt
            .query_map(rusqlite::params![card_id], |row| {
                Ok(Review {
                    card_id: row.get(0)?,
                    date: row.get(1)?,
                    seconds: row.get(2)?,
                    grade: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// Tags of one card, alphabetically
    pub fn get_tags(&self, card_id: i64) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM tags WHERE card_id = ?1 ORDER BY tag ASC")?;
        let tags = stmt
            .query_map(rusqlite::params![card_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    /// Add a tag to a card; adding an existing tag is a no-op
    pub fn add_tag(&self, card_id: i64, tag: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tags (card_id, tag) VALUES (?1, ?2)",
            rusqlite::params![card_id, tag],
        )?;
        Ok(())
    }

    pub fn remove_tag(&self, card_id: i64, tag: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM tags WHERE card_id = ?1 AND tag = ?2",
            rusqlite::params![card_id, tag],
        )?;
        Ok(())
    }

    /// Replace the whole tag set of a card in one transaction
    pub fn replace_tags(&self, card_id: i64, tags: &[String]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tags WHERE card_id = ?1", rusqlite::params![card_id])?;
        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO tags (card_id, tag) VALUES (?1, ?2)",
                rusqlite::params![card_id, tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
