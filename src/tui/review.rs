//! Presenting a single card and turning the final key into a grade.

use crossterm::event::{KeyCode, KeyEvent};

use crate::models::{Card, CardKind, Grade};
use crate::tui::error::TuiError;
use crate::tui::surface::{CardScreen, Surface};

/// Keys that abort a review before the answer is shown
pub fn is_immediate_exit(key: KeyCode) -> bool {
    matches!(key, KeyCode::Char('x') | KeyCode::Char('q') | KeyCode::Esc)
}

/// Map the grading key to a grade. Anything unrecognised exits.
pub fn grade_for_key(key: KeyCode) -> Grade {
    match key {
        KeyCode::Char('x') | KeyCode::Char('d') => Grade::Delete,
        KeyCode::Char('q') | KeyCode::Esc => Grade::Exit,
        KeyCode::Char('p') | KeyCode::Char('0') => Grade::Preview,
        KeyCode::Char('1') => Grade::Again,
        KeyCode::Char('2') => Grade::Hard,
        KeyCode::Char('3') | KeyCode::Char(' ') | KeyCode::Enter => Grade::Good,
        KeyCode::Char('4') => Grade::Easy,
        _ => Grade::Exit,
    }
}

/// Names of media blobs attached to one side of a card
fn media_labels(image: &Option<Vec<u8>>, audio: &Option<Vec<u8>>) -> Vec<&'static str> {
    let mut labels = Vec::new();
    if image.is_some() {
        labels.push("image");
    }
    if audio.is_some() {
        labels.push("audio");
    }
    labels
}

/// Walk the card through its presentation and return the key that ends it
pub fn present(surface: &mut dyn Surface, card: &Card, tags: &[String]) -> Result<KeyEvent, TuiError> {
    match card.kind {
        CardKind::Basic => present_basic(surface, card, tags),
        CardKind::Verses => present_verses(surface, card, tags),
    }
}

/// Question, any key to flip, answer with grade help
fn present_basic(surface: &mut dyn Surface, card: &Card, tags: &[String]) -> Result<KeyEvent, TuiError> {
    let mut lines: Vec<String> = card.front_text.lines().map(str::to_string).collect();
    surface.show_card(&CardScreen {
        kind: card.kind,
        lines: lines.clone(),
        tags,
        media: media_labels(&card.front_image, &card.front_audio),
        grading: false,
    })?;

    let flip = surface.read_key()?;
    if is_immediate_exit(flip.code) {
        return Ok(flip);
    }

    lines.push(String::new());
    lines.extend(card.back_text.lines().map(str::to_string));
    surface.show_card(&CardScreen {
        kind: card.kind,
        lines,
        tags,
        media: media_labels(&card.back_image, &card.back_audio),
        grading: true,
    })?;
    surface.read_key()
}

/// First line, then one more line per key, then the grade help
fn present_verses(surface: &mut dyn Surface, card: &Card, tags: &[String]) -> Result<KeyEvent, TuiError> {
    let verses: Vec<&str> = card.front_text.lines().collect();
    let media = media_labels(&card.front_image, &card.front_audio);
    let mut shown = verses.len().min(1);

    loop {
        let done = shown >= verses.len();
        surface.show_card(&CardScreen {
            kind: card.kind,
            lines: verses[..shown].iter().map(|line| line.to_string()).collect(),
            tags,
            media: media.clone(),
            grading: done,
        })?;

        let key = surface.read_key()?;
        if done || is_immediate_exit(key.code) {
            return Ok(key);
        }
        shown += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::julian::JulianDate;
    use crate::tui::surface::BrowserView;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Recorder {
        keys: VecDeque<KeyCode>,
        screens: Vec<(Vec<String>, bool)>,
    }

    impl Surface for Recorder {
        fn draw_browser(&mut self, _view: &BrowserView<'_>) -> Result<(), TuiError> {
            Ok(())
        }

        fn show_card(&mut self, screen: &CardScreen<'_>) -> Result<(), TuiError> {
            self.screens.push((screen.lines.clone(), screen.grading));
            Ok(())
        }

        fn read_key(&mut self) -> Result<KeyEvent, TuiError> {
            let code = self.keys.pop_front().unwrap_or(KeyCode::Esc);
            Ok(KeyEvent::from(code))
        }

        fn edit_text(&mut self, text: &str) -> Result<String, TuiError> {
            Ok(text.to_string())
        }
    }

    fn card(kind: CardKind, front: &str, back: &str) -> Card {
        Card {
            id: 1,
            create_date: JulianDate::from_day(1),
            due_date: JulianDate::from_day(1),
            front_text: front.to_string(),
            back_text: back.to_string(),
            front_image: None,
            back_image: None,
            front_audio: None,
            back_audio: None,
            deleted: false,
            kind,
        }
    }

    #[test]
    fn test_grade_keys() {
        assert_eq!(grade_for_key(KeyCode::Char('d')), Grade::Delete);
        assert_eq!(grade_for_key(KeyCode::Char('0')), Grade::Preview);
        assert_eq!(grade_for_key(KeyCode::Char('1')), Grade::Again);
        assert_eq!(grade_for_key(KeyCode::Char('2')), Grade::Hard);
        assert_eq!(grade_for_key(KeyCode::Enter), Grade::Good);
        assert_eq!(grade_for_key(KeyCode::Char(' ')), Grade::Good);
        assert_eq!(grade_for_key(KeyCode::Char('4')), Grade::Easy);
        assert_eq!(grade_for_key(KeyCode::Char('z')), Grade::Exit);
        assert_eq!(grade_for_key(KeyCode::Left), Grade::Exit);
    }

    #[test]
    fn test_basic_card_flips_then_grades() {
        let mut surface = Recorder {
            keys: VecDeque::from([KeyCode::Char('j'), KeyCode::Char('3')]),
            ..Recorder::default()
        };
        let key = present(&mut surface, &card(CardKind::Basic, "capital of Peru", "Lima"), &[]).unwrap();
        assert_eq!(key.code, KeyCode::Char('3'));
        assert_eq!(surface.screens.len(), 2);
        assert_eq!(surface.screens[0], (vec!["capital of Peru".to_string()], false));
        assert_eq!(surface.screens[1].0.last().map(String::as_str), Some("Lima"));
        assert!(surface.screens[1].1);
    }

    #[test]
    fn test_basic_card_immediate_exit_skips_answer() {
        let mut surface = Recorder {
            keys: VecDeque::from([KeyCode::Char('x')]),
            ..Recorder::default()
        };
        let key = present(&mut surface, &card(CardKind::Basic, "q", "a"), &[]).unwrap();
        assert_eq!(grade_for_key(key.code), Grade::Delete);
        assert_eq!(surface.screens.len(), 1);
    }

    #[test]
    fn test_verses_reveal_line_by_line() {
        let mut surface = Recorder {
            keys: VecDeque::from([KeyCode::Char(' '), KeyCode::Char(' '), KeyCode::Char('4')]),
            ..Recorder::default()
        };
        let poem = card(CardKind::Verses, "one\ntwo\nthree", "");
        let key = present(&mut surface, &poem, &[]).unwrap();
        assert_eq!(key.code, KeyCode::Char('4'));
        let revealed: Vec<usize> = surface.screens.iter().map(|(lines, _)| lines.len()).collect();
        assert_eq!(revealed, vec![1, 2, 3]);
        assert!(surface.screens[2].1);
    }

    #[test]
    fn test_verses_abort_mid_poem() {
        let mut surface = Recorder {
            keys: VecDeque::from([KeyCode::Char(' '), KeyCode::Char('q')]),
            ..Recorder::default()
        };
        let poem = card(CardKind::Verses, "one\ntwo\nthree", "");
        let key = present(&mut surface, &poem, &[]).unwrap();
        assert_eq!(grade_for_key(key.code), Grade::Exit);
        assert!(surface.screens.iter().all(|(_, grading)| !grading));
    }
}
