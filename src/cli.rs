use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::card::{CardError, CardField};
use crate::config::Config;
use crate::database::Database;
use crate::julian::JulianDate;
use crate::models::CardKind;
use crate::query::{Confirm, Filter, Query, QueryError};
use crate::tui::{self, TuiError};
use crate::tui::widgets::tags::parse_tags;

#[derive(Parser)]
#[command(name = "sprout")]
#[command(about = "Spaced-repetition flashcards in the terminal")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Which cards a command works on, and in what order
#[derive(Debug, Clone, Default, Args)]
pub struct Selection {
    #[command(flatten)]
    pub filter: Filter,

    /// Order by: due | seen | created | time | random
    #[arg(long)]
    pub sort: Option<String>,

    /// Reverse the sort order
    #[arg(long)]
    pub reverse: bool,

    /// Only cards whose text contains this
    #[arg(long)]
    pub search: Option<String>,
}

impl Selection {
    /// Narrow `base` by whatever was supplied on the command line
    pub fn apply<'db>(&self, base: &Query<'db>) -> Result<Query<'db>, QueryError> {
        let mut query = if self.filter.is_empty() {
            if self.filter.invert {
                return Err(QueryError::Usage("--invert needs a predicate to negate".to_string()));
            }
            base.clone()
        } else {
            base.filter(&self.filter)?
        };

        if let Some(ref pattern) = self.search {
            query = query.findall(pattern);
        }
        if let Some(ref criterion) = self.sort {
            query = query.sort_by_name(criterion, self.reverse)?;
        } else if self.reverse {
            return Err(QueryError::Usage("--reverse needs --sort".to_string()));
        }
        Ok(query)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse cards interactively (default if no subcommand)
    Browse {
        #[command(flatten)]
        selection: Selection,
    },
    /// Review the due cards of the selection
    Review {
        #[command(flatten)]
        selection: Selection,
    },
    /// Print the selected cards, one per line
    List {
        #[command(flatten)]
        selection: Selection,
        /// Print at most this many cards
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Number of selected cards
    Count {
        #[command(flatten)]
        selection: Selection,
    },
    /// Total, due and new counts
    Stats {
        #[command(flatten)]
        selection: Selection,
    },
    /// Tags used by the selected cards
    Tags {
        #[command(flatten)]
        selection: Selection,
    },
    /// Time spent studying the selected cards
    Time {
        #[command(flatten)]
        selection: Selection,
    },
    /// Most recently seen card containing PATTERN
    Find {
        pattern: String,
        #[command(flatten)]
        selection: Selection,
    },
    /// Add tags to every selected card
    Tag {
        #[arg(required = true)]
        tags: Vec<String>,
        #[command(flatten)]
        selection: Selection,
    },
    /// Remove a tag from every selected card
    RemoveTag {
        tag: String,
        #[command(flatten)]
        selection: Selection,
    },
    /// Flag the selected cards deleted
    Delete {
        #[command(flatten)]
        selection: Selection,
    },
    /// Un-delete the selected cards
    Restore {
        #[command(flatten)]
        selection: Selection,
    },
    /// Permanently remove selected cards that are flagged deleted
    Purge {
        #[command(flatten)]
        selection: Selection,
    },
    /// Add a question/answer card
    Basic {
        /// Question
        #[arg(long, default_value = "")]
        front: String,
        /// Answer
        #[arg(long, default_value = "")]
        back: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Add a card that is recited line by line
    Verses {
        text: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Details and schedule of the card at POSITION, as JSON
    Info {
        position: usize,
        #[command(flatten)]
        selection: Selection,
    },
    /// Write one field of the card at POSITION. VALUE may be a file path.
    Set {
        position: usize,
        field: String,
        value: String,
        #[command(flatten)]
        selection: Selection,
    },
    /// Push the card at POSITION DAYS into the future
    Postpone {
        position: usize,
        #[arg(default_value_t = 1, allow_hyphen_values = true)]
        days: i64,
        #[command(flatten)]
        selection: Selection,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    QueryError(#[from] QueryError),
    #[error(transparent)]
    CardError(#[from] CardError),
    #[error(transparent)]
    TuiError(#[from] TuiError),
    #[error("Failed to serialize: {0}")]
    SerializeError(#[from] serde_json::Error),
}

impl CliError {
    /// Errors that should be reported without a failing exit
    pub fn is_recoverable(&self) -> bool {
        match self {
            CliError::QueryError(e) => e.is_recoverable(),
            CliError::CardError(e) => e.is_recoverable(),
            CliError::TuiError(TuiError::QueryError(e)) => e.is_recoverable(),
            CliError::TuiError(TuiError::CardError(e)) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Run one command against the store
pub fn dispatch(
    command: Commands,
    db: &Database,
    config: &Config,
    today: JulianDate,
    confirm: &mut dyn Confirm,
) -> Result<(), CliError> {
    let all = Query::new(db, today);

    match command {
        Commands::Browse { selection } => handle_browse(&selection.apply(&all)?, config, false),
        Commands::Review { selection } => {
            let due = selection.apply(&all)?.filter(&Filter::due())?;
            handle_browse(&due, config, true)
        }
        Commands::List { selection, limit } => handle_list(&selection.apply(&all)?, limit),
        Commands::Count { selection } => {
            println!("{}", selection.apply(&all)?.count()?);
            Ok(())
        }
        Commands::Stats { selection } => handle_stats(&selection.apply(&all)?),
        Commands::Tags { selection } => {
            for tag in selection.apply(&all)?.tags()? {
                println!("{}", tag);
            }
            Ok(())
        }
        Commands::Time { selection } => {
            println!("{}", selection.apply(&all)?.time()?);
            Ok(())
        }
        Commands::Find { pattern, selection } => {
            let card = selection.apply(&all)?.find(&pattern)?;
            println!("{}", card.summary());
            Ok(())
        }
        Commands::Tag { tags, selection } => {
            let tags: Vec<String> = tags.iter().flat_map(|t| parse_tags(t)).collect();
            let added = selection.apply(&all)?.tag(&tags)?;
            println!("added {} tags", added);
            Ok(())
        }
        Commands::RemoveTag { tag, selection } => {
            let removed = selection.apply(&all)?.remove_tag(&tag)?;
            println!("removed {} tags", removed);
            Ok(())
        }
        Commands::Delete { selection } => {
            let deleted = selection.apply(&all)?.delete(confirm)?;
            println!("deleted {} cards", deleted);
            Ok(())
        }
        Commands::Restore { selection } => {
            let restored = selection.apply(&all)?.restore()?;
            println!("restored {} cards", restored);
            Ok(())
        }
        Commands::Purge { selection } => {
            let purged = selection.apply(&all)?.purge(confirm)?;
            println!("purged {} cards", purged);
            Ok(())
        }
        Commands::Basic { front, back, tags } => handle_add_basic(&all, front, back, tags),
        Commands::Verses { text, tags } => handle_add_verses(&all, text, tags),
        Commands::Info { position, selection } => handle_info(&selection.apply(&all)?, position),
        Commands::Set { position, field, value, selection } => {
            handle_set(&selection.apply(&all)?, position, &field, &value)
        }
        Commands::Postpone { position, days, selection } => {
            handle_postpone(&selection.apply(&all)?, position, days, config)
        }
    }
}

/// Handle the browse and review commands
pub fn handle_browse(query: &Query, config: &Config, reviewing: bool) -> Result<(), CliError> {
    if let Some(status) = tui::run_browser(query.clone(), config, reviewing)? {
        println!("{}", status);
    }
    Ok(())
}

/// Handle the list command
pub fn handle_list(query: &Query, limit: Option<usize>) -> Result<(), CliError> {
    let today = query.today();
    let cards = match limit {
        Some(limit) => query.head(limit)?,
        None => query.iter().collect::<Result<Vec<_>, _>>()?,
    };

    for (i, card) in cards.iter().enumerate() {
        let mark = if card.deleted {
            "x"
        } else if card.is_due(today) {
            "*"
        } else {
            " "
        };
        println!("{:>4} {} {}", i + 1, mark, card.summary());
    }
    Ok(())
}

/// Handle the stats command
pub fn handle_stats(query: &Query) -> Result<(), CliError> {
    let counts = query.stats()?;
    println!("total {}", counts.total);
    println!("due   {}", counts.due);
    println!("new   {}", counts.new);
    Ok(())
}

fn apply_tags(query: &Query, card_id: i64, tags: Option<String>) -> Result<(), CliError> {
    if let Some(tags) = tags {
        query.database().replace_tags(card_id, &parse_tags(&tags)).map_err(CardError::from)?;
    }
    Ok(())
}

/// Handle the basic command
pub fn handle_add_basic(
    query: &Query,
    front: String,
    back: String,
    tags: Option<String>,
) -> Result<(), CliError> {
    let db = query.database();
    let mut card = query.new_card(CardKind::Basic)?;
    card.set_front_text(db, front)?;
    card.set_back_text(db, back)?;
    apply_tags(query, card.id, tags)?;
    println!("Card created successfully (ID: {})", card.id);
    Ok(())
}

/// Handle the verses command
pub fn handle_add_verses(query: &Query, text: String, tags: Option<String>) -> Result<(), CliError> {
    let mut card = query.new_card(CardKind::Verses)?;
    card.set_front_text(query.database(), text)?;
    apply_tags(query, card.id, tags)?;
    println!("Card created successfully (ID: {})", card.id);
    Ok(())
}

/// Handle the info command
pub fn handle_info(query: &Query, position: usize) -> Result<(), CliError> {
    let card = query.get(position)?;
    let info = card.info(query.database())?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Handle the set command
pub fn handle_set(query: &Query, position: usize, field: &str, value: &str) -> Result<(), CliError> {
    let field: CardField = field.parse()?;
    let value = field.parse_value(value)?;
    let mut card = query.get(position)?;
    card.set_field(query.database(), field, value)?;
    println!("{}", card.summary());
    Ok(())
}

/// Handle the postpone command
pub fn handle_postpone(query: &Query, position: usize, days: i64, config: &Config) -> Result<(), CliError> {
    let mut card = query.get(position)?;
    let due = card.postpone(query.database(), query.today(), days, config.postpone_policy)?;
    println!("postponed until {}", due);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    fn day(d: i64) -> JulianDate {
        JulianDate::from_day(d)
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sprout").chain(args.iter().copied())).unwrap()
    }

    struct Always(bool);

    impl Confirm for Always {
        fn confirm(&mut self, _prompt: &str) -> std::io::Result<bool> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_selection_flags_parse() {
        let cli = parse(&["list", "--due", "--tag", "latin", "--created-after", "-7", "--sort", "due", "--limit", "3"]);
        match cli.command {
            Some(Commands::List { selection, limit }) => {
                assert!(selection.filter.due);
                assert_eq!(selection.filter.tag.as_deref(), Some("latin"));
                assert_eq!(selection.filter.created_after, Some(-7));
                assert_eq!(selection.sort.as_deref(), Some("due"));
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_deleted_flag_is_tri_state() {
        let bare = parse(&["count", "--deleted"]);
        let off = parse(&["count", "--deleted=false"]);
        let none = parse(&["count"]);

        let deleted = |cli: Cli| match cli.command {
            Some(Commands::Count { selection }) => selection.filter.deleted,
            _ => panic!("expected count"),
        };
        assert_eq!(deleted(bare), Some(true));
        assert_eq!(deleted(off), Some(false));
        assert_eq!(deleted(none), None);
    }

    #[test]
    fn test_bare_deleted_does_not_swallow_a_positional() {
        match parse(&["find", "--deleted", "river"]).command {
            Some(Commands::Find { pattern, selection }) => {
                assert_eq!(pattern, "river");
                assert_eq!(selection.filter.deleted, Some(true));
            }
            _ => panic!("expected find"),
        }
    }

    #[test]
    fn test_out_of_range_offset_is_recoverable() {
        let db = Database::open_in_memory().unwrap();
        let cli = parse(&["list", "--created-after", "9223372036854775807"]);
        let err = dispatch(cli.command.unwrap(), &db, &Config::default(), day(100), &mut Always(true)).unwrap_err();
        assert!(matches!(err, CliError::QueryError(QueryError::Usage(_))));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        assert!(parse(&["--dev"]).command.is_none());
    }

    #[test]
    fn test_postpone_days_default_to_one() {
        match parse(&["postpone", "2"]).command {
            Some(Commands::Postpone { position, days, .. }) => {
                assert_eq!(position, 2);
                assert_eq!(days, 1);
            }
            _ => panic!("expected postpone"),
        }
    }

    #[test]
    fn test_empty_selection_keeps_everything() {
        let db = Database::open_in_memory().unwrap();
        let all = Query::new(&db, day(100));
        all.new_card(CardKind::Basic).unwrap();
        all.new_card(CardKind::Verses).unwrap();

        let query = Selection::default().apply(&all).unwrap();
        assert_eq!(query.count().unwrap(), 2);
    }

    #[test]
    fn test_bare_invert_and_reverse_are_usage_errors() {
        let db = Database::open_in_memory().unwrap();
        let all = Query::new(&db, day(100));

        let invert = Selection { filter: Filter { invert: true, ..Filter::default() }, ..Selection::default() };
        assert!(matches!(invert.apply(&all), Err(QueryError::Usage(_))));

        let reverse = Selection { reverse: true, ..Selection::default() };
        assert!(matches!(reverse.apply(&all), Err(QueryError::Usage(_))));

        let bad_sort = Selection { sort: Some("alphabetical".to_string()), ..Selection::default() };
        assert!(matches!(bad_sort.apply(&all), Err(QueryError::Usage(_))));
    }

    #[test]
    fn test_search_narrows_selection() {
        let db = Database::open_in_memory().unwrap();
        let all = Query::new(&db, day(100));
        handle_add_basic(&all, "amo".to_string(), "I love".to_string(), Some("latin".to_string())).unwrap();
        handle_add_basic(&all, "hund".to_string(), "dog".to_string(), None).unwrap();

        let selection = Selection { search: Some("love".to_string()), ..Selection::default() };
        let query = selection.apply(&all).unwrap();
        assert_eq!(query.count().unwrap(), 1);
        assert_eq!(query.tags().unwrap(), vec!["latin".to_string()]);
    }

    #[test]
    fn test_set_and_postpone_by_position() {
        let db = Database::open_in_memory().unwrap();
        let all = Query::new(&db, day(100));
        handle_add_verses(&all, "arma virumque cano".to_string(), None).unwrap();

        handle_set(&all, 1, "back_text", "Aeneid I").unwrap();
        assert_eq!(all.get(1).unwrap().back_text, "Aeneid I");
        let immutable = handle_set(&all, 1, "due_date", "0").unwrap_err();
        assert!(matches!(immutable, CliError::CardError(CardError::ImmutableField(_))));
        assert!(immutable.is_recoverable());
        for (field, value) in [("colour", "red"), ("deleted", "maybe"), ("front_image", "/no/such/file.png")] {
            let err = handle_set(&all, 1, field, value).unwrap_err();
            assert!(err.is_recoverable(), "{} = {}: {}", field, value, err);
        }
        assert_eq!(all.get(1).unwrap().back_text, "Aeneid I");

        handle_postpone(&all, 1, 3, &Config::default()).unwrap();
        assert_eq!(all.get(1).unwrap().due_date, day(103));
        let overflow = handle_postpone(&all, 1, i64::MAX, &Config::default()).unwrap_err();
        assert!(overflow.is_recoverable());
        assert_eq!(all.get(1).unwrap().due_date, day(103));
    }

    #[test]
    fn test_declined_delete_is_recoverable() {
        let db = Database::open_in_memory().unwrap();
        let all = Query::new(&db, day(100));
        all.new_card(CardKind::Basic).unwrap();

        let err = dispatch(
            Commands::Delete { selection: Selection::default() },
            &db,
            &Config::default(),
            day(100),
            &mut Always(false),
        )
        .unwrap_err();
        assert!(err.is_recoverable());
        assert!(!all.get(1).unwrap().deleted);

        dispatch(
            Commands::Delete { selection: Selection::default() },
            &db,
            &Config::default(),
            day(100),
            &mut Always(true),
        )
        .unwrap();
        assert!(all.get(1).unwrap().deleted);
    }

    #[test]
    fn test_missing_position_is_recoverable() {
        let db = Database::open_in_memory().unwrap();
        let all = Query::new(&db, day(100));
        let err = handle_info(&all, 1).unwrap_err();
        assert!(err.is_recoverable());
    }
}
