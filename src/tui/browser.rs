//! The browse/review state machine.
//!
//! The browser walks a query's ordered id sequence. Cards are loaded from
//! the store only when they are drawn or acted upon, so edits made through
//! hotkeys are always visible on the next frame.

use crossterm::event::{KeyCode, KeyEvent};
use std::time::Instant;

use crate::card::PostponePolicy;
use crate::config::{Config, KeyBindings};
use crate::database::Database;
use crate::julian::JulianDate;
use crate::models::{Card, CardKind, Grade};
use crate::query::Query;
use crate::tui::error::TuiError;
use crate::tui::review;
use crate::tui::surface::{BrowserView, CardRow, Surface};
use crate::tui::widgets::tags::parse_tags;
use crate::utils::{parse_key_binding, ParsedKeyBinding};

/// Days a card moves forward when postponed from the browser
const POSTPONE_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Reviewing,
    Closed,
}

/// Browser key bindings, parsed once from the config
#[derive(Debug, Clone)]
pub struct BrowserKeys {
    pub review: ParsedKeyBinding,
    pub quit: ParsedKeyBinding,
    pub up: ParsedKeyBinding,
    pub down: ParsedKeyBinding,
    pub edit: ParsedKeyBinding,
    pub edit_tags: ParsedKeyBinding,
    pub toggle_delete: ParsedKeyBinding,
    pub postpone: ParsedKeyBinding,
    pub new_basic: ParsedKeyBinding,
    pub new_verses: ParsedKeyBinding,
}

impl BrowserKeys {
    pub fn from_bindings(bindings: &KeyBindings) -> Result<Self, TuiError> {
        let parse = |name: &str, value: &str| {
            parse_key_binding(value).map_err(|e| TuiError::KeyBindingError(format!("{}: {}", name, e)))
        };
        Ok(Self {
            review: parse("review", &bindings.review)?,
            quit: parse("quit", &bindings.quit)?,
            up: parse("up", &bindings.up)?,
            down: parse("down", &bindings.down)?,
            edit: parse("edit", &bindings.edit)?,
            edit_tags: parse("edit_tags", &bindings.edit_tags)?,
            toggle_delete: parse("toggle_delete", &bindings.toggle_delete)?,
            postpone: parse("postpone", &bindings.postpone)?,
            new_basic: parse("new_basic", &bindings.new_basic)?,
            new_verses: parse("new_verses", &bindings.new_verses)?,
        })
    }
}

/// Per-card actions available while browsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hotkey {
    Edit,
    EditTags,
    ToggleDelete,
    Postpone,
}

pub struct Browser<'db> {
    query: Query<'db>,
    ids: Vec<i64>,
    selected: usize,
    frame: usize,
    height: usize,
    keys: BrowserKeys,
    postpone_policy: PostponePolicy,
    mode: Mode,
    status: Option<String>,
}

impl<'db> Browser<'db> {
    pub fn new(query: Query<'db>, config: &Config) -> Result<Self, TuiError> {
        let ids = query.ids()?;
        Ok(Self {
            query,
            ids,
            selected: 0,
            frame: 0,
            height: usize::from(config.browser_height.max(1)),
            keys: BrowserKeys::from_bindings(&config.key_bindings)?,
            postpone_policy: config.postpone_policy,
            mode: Mode::Browsing,
            status: None,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Start in review mode instead of browsing
    pub fn start_reviewing(&mut self) {
        self.mode = Mode::Reviewing;
    }

    /// Drive the state machine until it closes
    pub fn run(&mut self, surface: &mut dyn Surface) -> Result<(), TuiError> {
        while self.mode != Mode::Closed {
            self.step(surface)?;
        }
        Ok(())
    }

    /// One transition: a review while reviewing, otherwise one key press
    pub fn step(&mut self, surface: &mut dyn Surface) -> Result<(), TuiError> {
        if self.ids.is_empty() {
            self.close_empty();
            return Ok(());
        }
        match self.mode {
            Mode::Closed => Ok(()),
            Mode::Reviewing => self.review_next(surface),
            Mode::Browsing => {
                self.draw(surface)?;
                let key = surface.read_key()?;
                self.handle_key(surface, key)
            }
        }
    }

    fn close_empty(&mut self) {
        self.status = Some("no cards".to_string());
        self.mode = Mode::Closed;
    }

    /// The card under the selection, if the sequence has one there
    fn selected_card(&self) -> Result<Option<Card>, TuiError> {
        match self.ids.get(self.selected) {
            Some(&id) => Ok(Some(self.query.database().get_card(id)?)),
            None => Ok(None),
        }
    }

    fn draw(&self, surface: &mut dyn Surface) -> Result<(), TuiError> {
        let today = self.query.today();
        let end = (self.frame + self.height).min(self.ids.len());
        let mut rows = Vec::with_capacity(end - self.frame);
        for (index, &id) in self.ids[self.frame..end].iter().enumerate() {
            let card = self.query.database().get_card(id)?;
            rows.push(CardRow {
                position: self.frame + index + 1,
                summary: card.summary(),
                due: card.is_due(today),
                deleted: card.deleted,
            });
        }

        surface.draw_browser(&BrowserView {
            rows,
            selected: self.selected,
            total: self.ids.len(),
            height: self.height,
            reviewing: self.mode == Mode::Reviewing,
            status: self.status.as_deref(),
        })
    }

    fn move_down(&mut self) {
        if self.selected + 1 < self.ids.len() {
            self.selected += 1;
            // scroll when the selection leaves the bottom of the frame
            if self.selected >= self.frame + self.height {
                self.frame += 1;
            }
        }
    }

    fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            if self.selected < self.frame {
                self.frame = self.selected;
            }
        }
    }

    /// Advance to the next due live card and review it
    fn review_next(&mut self, surface: &mut dyn Surface) -> Result<(), TuiError> {
        let today = self.query.today();
        let mut card = loop {
            let Some(card) = self.selected_card()? else {
                self.close_empty();
                return Ok(());
            };
            if card.is_due(today) && !card.deleted {
                break card;
            }
            if self.selected + 1 >= self.ids.len() {
                log::debug!("no more due cards");
                self.mode = Mode::Closed;
                return Ok(());
            }
            self.move_down();
        };

        self.draw(surface)?;
        let db = self.query.database();
        let tags = card.tags(db)?;

        let started = Instant::now();
        let key = review::present(surface, &card, &tags)?;
        let grade = review::grade_for_key(key.code);
        let seconds = started.elapsed().as_secs() as i64;

        card.record_review(db, grade, seconds, today)?;
        match grade {
            Grade::Delete => {
                card.set_deleted(db, true)?;
                self.status = Some("card deleted".to_string());
            }
            Grade::Exit => {
                self.mode = Mode::Browsing;
                self.status = None;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn handle_key(&mut self, surface: &mut dyn Surface, key: KeyEvent) -> Result<(), TuiError> {
        if self.keys.quit.matches(&key) || key.code == KeyCode::Esc {
            self.mode = Mode::Closed;
        } else if self.keys.review.matches(&key) {
            self.mode = Mode::Reviewing;
        } else if self.keys.down.matches(&key) || key.code == KeyCode::Down {
            self.move_down();
        } else if self.keys.up.matches(&key) || key.code == KeyCode::Up {
            self.move_up();
        } else if self.keys.edit.matches(&key) {
            self.run_hotkey(surface, Hotkey::Edit)?;
        } else if self.keys.edit_tags.matches(&key) {
            self.run_hotkey(surface, Hotkey::EditTags)?;
        } else if self.keys.toggle_delete.matches(&key) {
            self.run_hotkey(surface, Hotkey::ToggleDelete)?;
        } else if self.keys.postpone.matches(&key) {
            self.run_hotkey(surface, Hotkey::Postpone)?;
        } else if self.keys.new_basic.matches(&key) {
            self.create_card(surface, CardKind::Basic)?;
        } else if self.keys.new_verses.matches(&key) {
            self.create_card(surface, CardKind::Verses)?;
        }
        Ok(())
    }

    fn run_hotkey(&mut self, surface: &mut dyn Surface, hotkey: Hotkey) -> Result<(), TuiError> {
        let Some(mut card) = self.selected_card()? else {
            self.close_empty();
            return Ok(());
        };
        let db = self.query.database();

        let result = match hotkey {
            Hotkey::Edit => edit_card(surface, db, &mut card, self.query.today()).map(|_| "card edited".to_string()),
            Hotkey::EditTags => edit_tags(surface, db, &card).map(|tags| format!("tags: {}", tags.join(" "))),
            Hotkey::ToggleDelete => card
                .toggle_deleted(db)
                .map(|_| if card.deleted { "card deleted" } else { "card restored" }.to_string())
                .map_err(TuiError::from),
            Hotkey::Postpone => card
                .postpone(db, self.query.today(), POSTPONE_DAYS, self.postpone_policy)
                .map(|due| format!("postponed until {}", due))
                .map_err(TuiError::from),
        };

        self.status = Some(match result {
            Ok(message) => message,
            // a failed editor leaves the card untouched; report and carry on
            Err(TuiError::EditorError(e)) => format!("editor failed: {}", e),
            Err(e) => return Err(e),
        });
        Ok(())
    }

    /// Create a card, let the user fill it in, and insert it at the selection
    fn create_card(&mut self, surface: &mut dyn Surface, kind: CardKind) -> Result<(), TuiError> {
        let mut card = self.query.new_card(kind)?;

        if let Err(e) = edit_card(surface, self.query.database(), &mut card, self.query.today()) {
            match e {
                TuiError::EditorError(msg) => self.status = Some(format!("editor failed: {}", msg)),
                other => return Err(other),
            }
        } else {
            self.status = Some(format!("created card {}", card.id));
        }

        let at = self.selected.min(self.ids.len());
        self.ids.insert(at, card.id);
        self.selected = at;
        Ok(())
    }
}

/// Edit the text of a card and log the time spent. Basic cards edit both
/// sides; verses only have a front.
fn edit_card(
    surface: &mut dyn Surface,
    db: &Database,
    card: &mut Card,
    today: JulianDate,
) -> Result<(), TuiError> {
    let started = Instant::now();
    let front = surface.edit_text(&card.front_text)?;
    let back = match card.kind {
        CardKind::Basic => Some(surface.edit_text(&card.back_text)?),
        CardKind::Verses => None,
    };

    card.set_front_text(db, front)?;
    if let Some(back) = back {
        card.set_back_text(db, back)?;
    }
    let seconds = started.elapsed().as_secs() as i64;
    card.record_review(db, Grade::Edit, seconds, today)?;
    Ok(())
}

/// Replace the tag set of a card with whatever the user leaves in the editor
fn edit_tags(surface: &mut dyn Surface, db: &Database, card: &Card) -> Result<Vec<String>, TuiError> {
    let current = card.tags(db)?;
    let edited = surface.edit_text(&current.join(" "))?;
    let tags = parse_tags(&edited);
    card.replace_tags(db, &tags)?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card;
    use crate::query::SortCriterion;
    use crate::tui::surface::CardScreen;
    use std::collections::VecDeque;

    const TODAY: i64 = 2_460_000;

    fn today() -> JulianDate {
        JulianDate::from_day(TODAY)
    }

    /// Plays back keys and editor results, records what was drawn
    #[derive(Default)]
    struct Scripted {
        keys: VecDeque<KeyCode>,
        edits: VecDeque<String>,
        frames: Vec<(usize, Vec<usize>)>,
        cards_shown: usize,
    }

    impl Scripted {
        fn keys(keys: &[KeyCode]) -> Self {
            Self { keys: keys.iter().copied().collect(), ..Self::default() }
        }
    }

    impl Surface for Scripted {
        fn draw_browser(&mut self, view: &BrowserView<'_>) -> Result<(), TuiError> {
            let positions = view.rows.iter().map(|row| row.position).collect();
            self.frames.push((view.selected, positions));
            Ok(())
        }

        fn show_card(&mut self, _screen: &CardScreen<'_>) -> Result<(), TuiError> {
            self.cards_shown += 1;
            Ok(())
        }

        fn read_key(&mut self) -> Result<KeyEvent, TuiError> {
            // running out of script quits
            Ok(KeyEvent::from(self.keys.pop_front().unwrap_or(KeyCode::Char('q'))))
        }

        fn edit_text(&mut self, text: &str) -> Result<String, TuiError> {
            Ok(self.edits.pop_front().unwrap_or_else(|| text.to_string()))
        }
    }

    fn config(height: u16) -> Config {
        Config { browser_height: height, ..Config::default() }
    }

    fn add_cards(db: &Database, n: usize) -> Vec<i64> {
        (0..n)
            .map(|i| {
                let mut card = card::create_card(db, CardKind::Basic, today()).unwrap();
                card.set_front_text(db, format!("front {}", i)).unwrap();
                card.id
            })
            .collect()
    }

    /// Oldest card first
    fn in_creation_order(db: &Database) -> Query<'_> {
        Query::new(db, today()).sort(SortCriterion::Created, true)
    }

    fn grades(db: &Database, id: i64) -> Vec<Grade> {
        db.get_reviews(id).unwrap().iter().map(|r| r.grade).collect()
    }

    #[test]
    fn test_selection_is_bounded_and_scrolls_frame() {
        let db = Database::open_in_memory().unwrap();
        add_cards(&db, 4);
        let mut browser = Browser::new(in_creation_order(&db), &config(2)).unwrap();

        let mut surface = Scripted::keys(&[KeyCode::Char('j'); 5]);
        for _ in 0..5 {
            browser.step(&mut surface).unwrap();
        }
        assert_eq!(browser.selected(), 3);
        assert_eq!(browser.frame(), 2);

        let mut surface = Scripted::keys(&[KeyCode::Up; 5]);
        for _ in 0..5 {
            browser.step(&mut surface).unwrap();
        }
        assert_eq!(browser.selected(), 0);
        assert_eq!(browser.frame(), 0);
        assert_eq!(surface.frames.last(), Some(&(0, vec![1, 2])));
    }

    #[test]
    fn test_quit_keys_close() {
        let db = Database::open_in_memory().unwrap();
        add_cards(&db, 1);
        for key in [KeyCode::Char('q'), KeyCode::Esc] {
            let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();
            browser.run(&mut Scripted::keys(&[key])).unwrap();
            assert_eq!(browser.mode(), Mode::Closed);
        }
    }

    #[test]
    fn test_empty_query_closes_immediately() {
        let db = Database::open_in_memory().unwrap();
        let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();
        let mut surface = Scripted::default();
        browser.run(&mut surface).unwrap();
        assert_eq!(browser.mode(), Mode::Closed);
        assert_eq!(browser.status(), Some("no cards"));
        assert!(surface.frames.is_empty());
    }

    #[test]
    fn test_review_logs_and_schedules_each_card() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 2);
        let mut browser = Browser::new(in_creation_order(&db), &config(6)).unwrap();

        let mut surface = Scripted::keys(&[
            KeyCode::Char('r'),
            KeyCode::Char(' '), KeyCode::Char('3'),
            KeyCode::Char(' '), KeyCode::Char('4'),
        ]);
        browser.run(&mut surface).unwrap();

        assert_eq!(browser.mode(), Mode::Closed);
        assert_eq!(surface.cards_shown, 4);
        assert_eq!(grades(&db, ids[0]), vec![Grade::Create, Grade::Good]);
        assert_eq!(grades(&db, ids[1]), vec![Grade::Create, Grade::Easy]);
        assert_eq!(db.get_card(ids[0]).unwrap().due_date, today() + 1);
    }

    #[test]
    fn test_exit_grade_returns_to_browsing_without_moving_due() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 2);
        let mut browser = Browser::new(in_creation_order(&db), &config(6)).unwrap();
        browser.start_reviewing();

        let mut surface = Scripted::keys(&[KeyCode::Char(' '), KeyCode::Char('z')]);
        browser.step(&mut surface).unwrap();

        assert_eq!(browser.mode(), Mode::Browsing);
        assert_eq!(grades(&db, ids[0]), vec![Grade::Create, Grade::Exit]);
        assert_eq!(db.get_card(ids[0]).unwrap().due_date, today());
    }

    #[test]
    fn test_review_skips_cards_that_are_not_due() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 3);
        let mut first = db.get_card(ids[0]).unwrap();
        first.record_review(&db, Grade::Good, 1, today()).unwrap();
        let mut second = db.get_card(ids[1]).unwrap();
        second.set_deleted(&db, true).unwrap();

        let mut browser = Browser::new(in_creation_order(&db), &config(6)).unwrap();
        browser.start_reviewing();
        let mut surface = Scripted::keys(&[KeyCode::Char(' '), KeyCode::Char('p')]);
        browser.step(&mut surface).unwrap();

        assert_eq!(browser.selected(), 2);
        assert_eq!(grades(&db, ids[2]), vec![Grade::Create, Grade::Preview]);
        assert_eq!(db.get_card(ids[2]).unwrap().due_date, today());
    }

    #[test]
    fn test_empty_browser_steps_close_instead_of_panicking() {
        let db = Database::open_in_memory().unwrap();

        let mut reviewing = Browser::new(Query::new(&db, today()), &config(6)).unwrap();
        reviewing.start_reviewing();
        reviewing.step(&mut Scripted::default()).unwrap();
        assert_eq!(reviewing.mode(), Mode::Closed);

        for key in ['e', 't', 'd', '+'] {
            let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();
            let mut surface = Scripted::keys(&[KeyCode::Char(key)]);
            browser.step(&mut surface).unwrap();
            assert_eq!(browser.mode(), Mode::Closed);
            assert_eq!(browser.status(), Some("no cards"));
            assert!(surface.frames.is_empty());
        }
    }

    #[test]
    fn test_again_keeps_card_in_the_review_queue() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 1);
        let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();

        let mut surface = Scripted::keys(&[
            KeyCode::Char('r'),
            KeyCode::Char(' '), KeyCode::Char('1'),
            KeyCode::Char(' '), KeyCode::Char('3'),
        ]);
        browser.run(&mut surface).unwrap();

        assert_eq!(surface.cards_shown, 4);
        assert_eq!(grades(&db, ids[0]), vec![Grade::Create, Grade::Again, Grade::Good]);
        assert_eq!(db.get_card(ids[0]).unwrap().due_date, today() + 1);
        assert_eq!(browser.mode(), Mode::Closed);
    }

    #[test]
    fn test_delete_grade_flags_card() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 1);
        let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();
        browser.start_reviewing();
        browser.run(&mut Scripted::keys(&[KeyCode::Char('x')])).unwrap();

        assert!(db.get_card(ids[0]).unwrap().deleted);
        assert_eq!(grades(&db, ids[0]), vec![Grade::Create, Grade::Delete]);
        assert_eq!(browser.mode(), Mode::Closed);
    }

    #[test]
    fn test_edit_hotkey_writes_text_and_logs_edit() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 1);
        let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();

        let mut surface = Scripted::keys(&[KeyCode::Char('e')]);
        surface.edits = VecDeque::from(["der Hund".to_string(), "the dog".to_string()]);
        browser.step(&mut surface).unwrap();

        let card = db.get_card(ids[0]).unwrap();
        assert_eq!(card.front_text, "der Hund");
        assert_eq!(card.back_text, "the dog");
        assert_eq!(grades(&db, ids[0]), vec![Grade::Create, Grade::Edit]);
        assert_eq!(browser.status(), Some("card edited"));
    }

    #[test]
    fn test_tag_delete_and_postpone_hotkeys() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 1);
        let mut browser = Browser::new(Query::new(&db, today()), &config(6)).unwrap();

        let mut surface = Scripted::keys(&[KeyCode::Char('t'), KeyCode::Char('d'), KeyCode::Char('+')]);
        surface.edits = VecDeque::from(["german, nouns".to_string()]);
        for _ in 0..3 {
            browser.step(&mut surface).unwrap();
        }

        let card = db.get_card(ids[0]).unwrap();
        assert_eq!(db.get_tags(ids[0]).unwrap(), vec!["german", "nouns"]);
        assert!(card.deleted);
        assert_eq!(card.due_date, today() + 1);
        // silent postpone leaves no trace in the log
        assert_eq!(grades(&db, ids[0]), vec![Grade::Create]);

        let mut surface = Scripted::keys(&[KeyCode::Char('d')]);
        browser.step(&mut surface).unwrap();
        assert!(!db.get_card(ids[0]).unwrap().deleted);
        assert_eq!(browser.status(), Some("card restored"));
    }

    #[test]
    fn test_new_card_is_inserted_at_selection() {
        let db = Database::open_in_memory().unwrap();
        let ids = add_cards(&db, 3);
        let mut browser = Browser::new(in_creation_order(&db), &config(6)).unwrap();

        let mut surface = Scripted::keys(&[KeyCode::Char('j'), KeyCode::Char('v')]);
        surface.edits = VecDeque::from(["line one\nline two".to_string()]);
        browser.step(&mut surface).unwrap();
        browser.step(&mut surface).unwrap();

        assert_eq!(browser.ids().len(), 4);
        assert_eq!(browser.selected(), 1);
        let created = db.get_card(browser.ids()[1]).unwrap();
        assert_eq!(created.kind, CardKind::Verses);
        assert_eq!(created.front_text, "line one\nline two");
        assert_eq!(&browser.ids()[2..], &ids[1..]);
        assert_eq!(grades(&db, created.id), vec![Grade::Create, Grade::Edit]);
    }

    #[test]
    fn test_configured_keys() {
        let db = Database::open_in_memory().unwrap();
        add_cards(&db, 2);
        let mut config = config(6);
        config.key_bindings.down = "n".to_string();
        config.key_bindings.quit = "Ctrl+c".to_string();
        let mut browser = Browser::new(Query::new(&db, today()), &config).unwrap();

        let mut surface = Scripted::keys(&[KeyCode::Char('n')]);
        browser.step(&mut surface).unwrap();
        assert_eq!(browser.selected(), 1);

        // plain 'q' no longer quits
        browser.step(&mut Scripted::keys(&[KeyCode::Char('q')])).unwrap();
        assert_eq!(browser.mode(), Mode::Browsing);

        config.key_bindings.review = "Hyper+r".to_string();
        assert!(matches!(
            Browser::new(Query::new(&db, today()), &config),
            Err(TuiError::KeyBindingError(_))
        ));
    }
}
