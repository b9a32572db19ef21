//! Lazily evaluated card selections.
//!
//! A [`Query`] is an SQL expression under construction: an always-true base
//! clause AND-ed with predicate fragments, plus exactly one ordering. Every
//! transformation returns a new query; nothing touches the store until the
//! query is counted, iterated or used for a bulk update.

use rusqlite::types::Value;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::card::{self, CardError};
use crate::database::{Database, DatabaseError, CARD_COLUMNS};
use crate::julian::JulianDate;
use crate::models::{Card, CardKind};

/// Rows fetched per round trip when iterating
pub const PAGE_SIZE: i64 = 64;

pub const FILTER_HELP: &str = "Examples:\n\
    --new                  new cards\n\
    --created-after -7     created in the last week\n\
    --due --tag latin      due cards tagged latin\n\
    \n\
    Run with --help for a complete list of predicates";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    NotFound(String),
    #[error("aborted")]
    ConfirmationDeclined,
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("{0}")]
    CardError(#[from] CardError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        QueryError::DatabaseError(DatabaseError::from(e))
    }
}

impl QueryError {
    /// Errors that end the command but leave nothing to clean up
    pub fn is_recoverable(&self) -> bool {
        match self {
            QueryError::Usage(_) | QueryError::NotFound(_) | QueryError::ConfirmationDeclined => true,
            QueryError::CardError(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Single keypress gate in front of destructive bulk actions
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool>;
}

/// Named predicates accepted by [`Query::filter`]. Date offsets are in days
/// relative to today.
#[derive(Debug, Clone, Default, PartialEq, clap::Args)]
pub struct Filter {
    /// Cards carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Created more than N days from today (negative for the past)
    #[arg(long, allow_hyphen_values = true)]
    pub created_after: Option<i64>,
    /// Created less than N days from today
    #[arg(long, allow_hyphen_values = true)]
    pub created_before: Option<i64>,
    /// Due more than N days from today
    #[arg(long, allow_hyphen_values = true)]
    pub due_after: Option<i64>,
    /// Due less than N days from today
    #[arg(long, allow_hyphen_values = true)]
    pub due_before: Option<i64>,
    /// Deleted cards (`--deleted=false` for live cards only)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub deleted: Option<bool>,
    /// Cards due today or earlier
    #[arg(long)]
    pub due: bool,
    /// Cards that have never been studied
    #[arg(long)]
    pub new: bool,
    /// Verse cards
    #[arg(long)]
    pub verses: bool,
    /// Negate every supplied predicate
    #[arg(long)]
    pub invert: bool,
}

impl Filter {
    pub fn due() -> Self {
        Self { due: true, ..Self::default() }
    }

    pub fn deleted() -> Self {
        Self { deleted: Some(true), ..Self::default() }
    }

    pub fn new_cards() -> Self {
        Self { new: true, ..Self::default() }
    }

    pub fn tagged(tag: &str) -> Self {
        Self { tag: Some(tag.to_string()), ..Self::default() }
    }

    /// True when no predicate is set (`invert` alone does not count)
    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.due_after.is_none()
            && self.due_before.is_none()
            && self.deleted.is_none()
            && !(self.due || self.new || self.verses)
    }

    fn predicates(&self, today: JulianDate) -> Result<Vec<Condition>, QueryError> {
        let today = today.day();
        let mut conditions = Vec::new();

        if let Some(ref tag) = self.tag {
            conditions.push(Condition::with(
                "EXISTS (SELECT 1 FROM tags WHERE tags.card_id = cards.id AND tags.tag = ?)",
                vec![Value::Text(tag.clone())],
            ));
        }
        if let Some(offset) = self.created_after {
            let day = offset_day(today, offset, "created-after")?;
            conditions.push(Condition::with(
                "cards.create_date > ?",
                vec![Value::Real(day)],
            ));
        }
        if let Some(offset) = self.created_before {
            let day = offset_day(today, offset, "created-before")?;
            conditions.push(Condition::with(
                "cards.create_date < ?",
                vec![Value::Real(day)],
            ));
        }
        if let Some(offset) = self.due_after {
            let day = offset_day(today, offset, "due-after")?;
            conditions.push(Condition::with(
                "cards.due_date > ?",
                vec![Value::Real(day)],
            ));
        }
        if let Some(offset) = self.due_before {
            let day = offset_day(today, offset, "due-before")?;
            conditions.push(Condition::with(
                "cards.due_date < ?",
                vec![Value::Real(day)],
            ));
        }
        if self.due {
            // any hour of today still counts
            conditions.push(Condition::with(
                "cards.due_date < ?",
                vec![Value::Real((today + 1) as f64)],
            ));
        }
        match self.deleted {
            Some(true) => conditions.push(Condition::plain("cards.deleted = 1")),
            Some(false) => conditions.push(Condition::plain("cards.deleted = 0")),
            None => {}
        }
        if self.verses {
            conditions.push(Condition::plain("cards.verses = 1"));
        }
        if self.new {
            conditions.push(Condition::plain("cards.due_date = cards.create_date"));
        }

        Ok(conditions)
    }
}

/// `today + offset` as a stored day value, rejecting offsets that leave the calendar
fn offset_day(today: i64, offset: i64, flag: &str) -> Result<f64, QueryError> {
    today
        .checked_add(offset)
        .map(|day| day as f64)
        .ok_or_else(|| QueryError::Usage(format!("--{} {} is out of range", flag, offset)))
}

/// One SQL predicate fragment with its positional parameters
#[derive(Debug, Clone, PartialEq)]
struct Condition {
    sql: String,
    params: Vec<Value>,
}

impl Condition {
    fn plain(sql: &str) -> Self {
        Self { sql: sql.to_string(), params: Vec::new() }
    }

    fn with(sql: &str, params: Vec<Value>) -> Self {
        Self { sql: sql.to_string(), params }
    }

    fn negated(self) -> Self {
        Self { sql: format!("NOT ({})", self.sql), params: self.params }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion {
    Due,
    Created,
    Random,
    Time,
    Seen,
}

impl SortCriterion {
    pub const ALL: [SortCriterion; 5] = [
        SortCriterion::Due,
        SortCriterion::Seen,
        SortCriterion::Created,
        SortCriterion::Time,
        SortCriterion::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortCriterion::Due => "due",
            SortCriterion::Created => "created",
            SortCriterion::Random => "random",
            SortCriterion::Time => "time",
            SortCriterion::Seen => "seen",
        }
    }

    /// Most recent or most costly first unless reversed
    fn descending_by_default(self) -> bool {
        matches!(self, SortCriterion::Created | SortCriterion::Seen | SortCriterion::Time)
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortCriterion {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortCriterion::ALL
            .into_iter()
            .find(|criterion| criterion.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = SortCriterion::ALL.iter().map(|c| c.name()).collect();
                QueryError::Usage(format!("supply a criterion: {}", names.join(" | ")))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ordering {
    criterion: SortCriterion,
    descending: bool,
    /// Permutation seed for `random`, so every page sees the same order
    seed: i64,
}

impl Ordering {
    fn new(criterion: SortCriterion, reverse: bool) -> Self {
        let seed = if criterion == SortCriterion::Random {
            rand::random::<u32>() as i64
        } else {
            0
        };
        Self {
            criterion,
            descending: criterion.descending_by_default() ^ reverse,
            seed,
        }
    }

    fn sql(&self) -> String {
        let key = match self.criterion {
            SortCriterion::Due => "cards.due_date".to_string(),
            SortCriterion::Created => "cards.create_date".to_string(),
            SortCriterion::Random => random_key(self.seed),
            SortCriterion::Time => {
                "(SELECT COALESCE(SUM(seconds), 0) FROM reviews WHERE reviews.card_id = cards.id)".to_string()
            }
            SortCriterion::Seen => {
                "(SELECT MAX(date) FROM reviews WHERE reviews.card_id = cards.id)".to_string()
            }
        };
        let direction = if self.descending { "DESC" } else { "ASC" };
        // id keeps ties in a stable order between pages
        format!("{key} {direction}, cards.id {direction}")
    }
}

/// `a XOR b`; SQLite has no xor operator
fn xor_sql(a: &str, b: &str) -> String {
    format!("(({a} | {b}) - ({a} & {b}))")
}

/// Two multiply/xorshift rounds over `id ^ seed`, kept below 2^31 so no
/// intermediate product leaves the 64-bit range
fn random_key(seed: i64) -> String {
    let mixed = xor_sql("cards.id", &seed.to_string());
    let first = format!("(({mixed} * 1103515245) & 2147483647)");
    let shifted = xor_sql(&first, &format!("({first} >> 15)"));
    format!("(({shifted} * 2246822519) & 2147483647)")
}

/// Total logged study time, displayed as `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StudyTime {
    pub seconds: i64,
}

impl fmt::Display for StudyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.seconds / 60;
        write!(f, "{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardCounts {
    pub total: i64,
    pub due: i64,
    pub new: i64,
}

/// A composable selection of cards in some order
#[derive(Clone)]
pub struct Query<'db> {
    db: &'db Database,
    today: JulianDate,
    conditions: Vec<Condition>,
    ordering: Ordering,
}

impl<'db> Query<'db> {
    /// Every card, most recently seen first
    pub fn new(db: &'db Database, today: JulianDate) -> Self {
        Self {
            db,
            today,
            conditions: Vec::new(),
            ordering: Ordering::new(SortCriterion::Seen, false),
        }
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn today(&self) -> JulianDate {
        self.today
    }

    fn where_clause(&self) -> String {
        let mut clauses = vec!["1"];
        clauses.extend(self.conditions.iter().map(|c| c.sql.as_str()));
        format!(" WHERE {}", clauses.join(" AND "))
    }

    fn params(&self) -> impl Iterator<Item = &Value> {
        self.conditions.iter().flat_map(|c| c.params.iter())
    }

    /// Ids of every matched card, in order
    fn select_ids_sql(&self) -> String {
        format!("SELECT cards.id FROM cards{} ORDER BY {}", self.where_clause(), self.ordering.sql())
    }

    /// Unordered id subquery for bulk statements
    fn matched_ids_sql(&self) -> String {
        format!("SELECT cards.id FROM cards{}", self.where_clause())
    }

    /// Narrow the selection. Calling this with no predicate is a usage error
    /// rather than a silent "select everything".
    pub fn filter(&self, filter: &Filter) -> Result<Query<'db>, QueryError> {
        let predicates = filter.predicates(self.today)?;
        if predicates.is_empty() {
            return Err(QueryError::Usage(FILTER_HELP.to_string()));
        }

        let mut next = self.clone();
        for condition in predicates {
            next.conditions.push(if filter.invert { condition.negated() } else { condition });
        }
        Ok(next)
    }

    /// Replace the ordering
    pub fn sort(&self, criterion: SortCriterion, reverse: bool) -> Query<'db> {
        let mut next = self.clone();
        next.ordering = Ordering::new(criterion, reverse);
        next
    }

    /// [`Query::sort`] with the criterion given by name
    pub fn sort_by_name(&self, criterion: &str, reverse: bool) -> Result<Query<'db>, QueryError> {
        Ok(self.sort(criterion.parse()?, reverse))
    }

    /// Cards whose front or back text contains `pattern`
    pub fn findall(&self, pattern: &str) -> Query<'db> {
        let mut next = self.clone();
        next.conditions.push(Condition::with(
            "(instr(cards.front_text, ?) > 0 OR instr(cards.back_text, ?) > 0)",
            vec![Value::Text(pattern.to_string()), Value::Text(pattern.to_string())],
        ));
        next
    }

    /// The most recently seen card containing `pattern`
    pub fn find(&self, pattern: &str) -> Result<Card, QueryError> {
        self.findall(pattern)
            .sort(SortCriterion::Seen, false)
            .get(1)
            .map_err(|e| match e {
                QueryError::NotFound(_) => QueryError::NotFound(format!("no cards containing \"{}\"", pattern)),
                other => other,
            })
    }

    pub fn count(&self) -> Result<i64, QueryError> {
        let sql = format!("SELECT COUNT(*) FROM cards{}", self.where_clause());
        let count = self
            .db
            .conn()
            .query_row(&sql, rusqlite::params_from_iter(self.params()), |row| row.get(0))?;
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, QueryError> {
        Ok(self.count()? == 0)
    }

    /// The ordered identifier sequence
    pub fn ids(&self) -> Result<Vec<i64>, QueryError> {
        let sql = self.select_ids_sql();
        log::debug!("query: {}", sql);
        let mut stmt = self.db.conn().prepare(&sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(self.params()), |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Up to `limit` ids starting at 0-based `offset`
    fn page(&self, offset: i64, limit: i64) -> Result<Vec<i64>, QueryError> {
        let sql = format!("{} LIMIT ? OFFSET ?", self.select_ids_sql());
        let bounds = [Value::Integer(limit), Value::Integer(offset)];
        let mut stmt = self.db.conn().prepare(&sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(self.params().chain(bounds.iter())), |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// The card at a 1-based position
    pub fn get(&self, position: usize) -> Result<Card, QueryError> {
        if position == 0 {
            return Err(QueryError::Usage("card positions start at 1".to_string()));
        }
        let id = self
            .page(position as i64 - 1, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::NotFound(format!("no card at position {}", position)))?;
        Ok(self.db.get_card(id)?)
    }

    /// Cards in order, fetched [`PAGE_SIZE`] at a time
    pub fn iter(&self) -> Cards<'_, 'db> {
        Cards {
            query: self,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// The first `limit` cards, in order
    pub fn head(&self, limit: usize) -> Result<Vec<Card>, QueryError> {
        self.iter().take(limit).collect()
    }

    /// Distinct tags used by the matched cards
    pub fn tags(&self) -> Result<Vec<String>, QueryError> {
        let sql = format!(
            "SELECT DISTINCT tags.tag FROM tags WHERE tags.card_id IN ({}) ORDER BY tags.tag ASC",
            self.matched_ids_sql()
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let tags = stmt
            .query_map(rusqlite::params_from_iter(self.params()), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    pub fn stats(&self) -> Result<CardCounts, QueryError> {
        Ok(CardCounts {
            total: self.count()?,
            due: self.filter(&Filter::due())?.count()?,
            new: self.filter(&Filter::new_cards())?.count()?,
        })
    }

    /// Total seconds logged against the matched cards
    pub fn time(&self) -> Result<StudyTime, QueryError> {
        let sql = format!(
            "SELECT COALESCE(SUM(reviews.seconds), 0) FROM reviews WHERE reviews.card_id IN ({})",
            self.matched_ids_sql()
        );
        let seconds = self
            .db
            .conn()
            .query_row(&sql, rusqlite::params_from_iter(self.params()), |row| row.get(0))?;
        Ok(StudyTime { seconds })
    }

    /// Create a card dated today
    pub fn new_card(&self, kind: CardKind) -> Result<Card, QueryError> {
        Ok(card::create_card(self.db, kind, self.today)?)
    }

    /// Add tags to every matched card. Returns the number of tag rows added.
    pub fn tag(&self, tags: &[String]) -> Result<usize, QueryError> {
        let sql = format!(
            "INSERT OR IGNORE INTO tags (card_id, tag) SELECT cards.id, ? FROM cards{}",
            self.where_clause()
        );
        let tx = self.db.conn().unchecked_transaction()?;
        let mut added = 0;
        for tag in tags {
            let tag = Value::Text(tag.clone());
            added += tx.execute(
                &sql,
                rusqlite::params_from_iter(std::iter::once(&tag).chain(self.params())),
            )?;
        }
        tx.commit()?;
        log::info!("added {} tags", added);
        Ok(added)
    }

    /// Remove a tag from every matched card. Returns the number removed.
    pub fn remove_tag(&self, tag: &str) -> Result<usize, QueryError> {
        let sql = format!(
            "DELETE FROM tags WHERE tags.tag = ? AND tags.card_id IN ({})",
            self.matched_ids_sql()
        );
        let tag = Value::Text(tag.to_string());
        let removed = self.db.conn().execute(
            &sql,
            rusqlite::params_from_iter(std::iter::once(&tag).chain(self.params())),
        )?;
        log::info!("removed {} tags", removed);
        Ok(removed)
    }

    /// Flag every matched card deleted, after confirmation
    pub fn delete(&self, confirm: &mut dyn Confirm) -> Result<usize, QueryError> {
        let n = self.count()?;
        if !confirm.confirm(&format!("delete {} cards? y/n", n))? {
            return Err(QueryError::ConfirmationDeclined);
        }
        let sql = format!("UPDATE cards SET deleted = 1{}", self.where_clause());
        let deleted = self
            .db
            .conn()
            .execute(&sql, rusqlite::params_from_iter(self.params()))?;
        log::info!("deleted {} cards", deleted);
        Ok(deleted)
    }

    /// Clear the deleted flag on matched cards. Returns how many were restored.
    pub fn restore(&self) -> Result<usize, QueryError> {
        let deleted_cards = self.filter(&Filter::deleted())?;
        let sql = format!("UPDATE cards SET deleted = 0{}", deleted_cards.where_clause());
        let restored = self
            .db
            .conn()
            .execute(&sql, rusqlite::params_from_iter(deleted_cards.params()))?;
        log::info!("restored {} cards", restored);
        Ok(restored)
    }

    /// Permanently remove matched cards that are flagged deleted, along with
    /// their reviews and tags
    pub fn purge(&self, confirm: &mut dyn Confirm) -> Result<usize, QueryError> {
        let deleted_cards = self.filter(&Filter::deleted())?;
        let n = deleted_cards.count()?;
        if n == 0 {
            return Err(QueryError::NotFound("no deleted cards to purge".to_string()));
        }
        if !confirm.confirm(&format!("permanently remove {} cards?! y/n", n))? {
            return Err(QueryError::ConfirmationDeclined);
        }

        let ids = deleted_cards.matched_ids_sql();
        let tx = self.db.conn().unchecked_transaction()?;
        tx.execute(
            &format!("DELETE FROM reviews WHERE card_id IN ({})", ids),
            rusqlite::params_from_iter(deleted_cards.params()),
        )?;
        tx.execute(
            &format!("DELETE FROM tags WHERE card_id IN ({})", ids),
            rusqlite::params_from_iter(deleted_cards.params()),
        )?;
        let purged = tx.execute(
            &format!("DELETE FROM cards{}", deleted_cards.where_clause()),
            rusqlite::params_from_iter(deleted_cards.params()),
        )?;
        tx.commit()?;
        log::info!("purged {} cards", purged);
        Ok(purged)
    }
}

/// Paged iterator over a query's cards
pub struct Cards<'q, 'db> {
    query: &'q Query<'db>,
    offset: i64,
    buffer: VecDeque<i64>,
    exhausted: bool,
}

impl Iterator for Cards<'_, '_> {
    type Item = Result<Card, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.query.page(self.offset, PAGE_SIZE) {
                Ok(ids) => {
                    self.exhausted = (ids.len() as i64) < PAGE_SIZE;
                    self.offset += ids.len() as i64;
                    self.buffer.extend(ids);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        let id = self.buffer.pop_front()?;
        Some(self.query.db.get_card(id).map_err(QueryError::from))
    }
}
