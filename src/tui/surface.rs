//! The presentation seam between the browser state machine and whatever
//! draws it. The terminal implementation lives in `events.rs`; tests drive
//! the browser with a scripted surface.

use crossterm::event::KeyEvent;

use crate::models::CardKind;
use crate::tui::error::TuiError;

/// One line of the card list
#[derive(Debug, Clone, PartialEq)]
pub struct CardRow {
    /// 1-based position in the browsed sequence
    pub position: usize,
    pub summary: String,
    pub due: bool,
    pub deleted: bool,
}

/// Everything needed to draw the browser frame
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserView<'a> {
    /// The visible window of the sequence, at most `height` rows
    pub rows: Vec<CardRow>,
    /// 0-based index of the selected card in the whole sequence
    pub selected: usize,
    pub total: usize,
    pub height: usize,
    pub reviewing: bool,
    pub status: Option<&'a str>,
}

impl BrowserView<'_> {
    /// The "n of N" indicator is only shown when the list does not fit
    pub fn position_label(&self) -> Option<String> {
        (self.total > self.height).then(|| format!("{} of {}", self.selected + 1, self.total))
    }
}

/// A card face during review
#[derive(Debug, Clone, PartialEq)]
pub struct CardScreen<'a> {
    pub kind: CardKind,
    /// Text revealed so far
    pub lines: Vec<String>,
    pub tags: &'a [String],
    /// Attached media that cannot be shown in a terminal
    pub media: Vec<&'static str>,
    /// Show the end marker and the grade help
    pub grading: bool,
}

pub trait Surface {
    fn draw_browser(&mut self, view: &BrowserView<'_>) -> Result<(), TuiError>;

    fn show_card(&mut self, screen: &CardScreen<'_>) -> Result<(), TuiError>;

    /// Block for one key press
    fn read_key(&mut self) -> Result<KeyEvent, TuiError>;

    /// Hand `text` to an editor and return the result
    fn edit_text(&mut self, text: &str) -> Result<String, TuiError>;
}
