use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, size as terminal_size};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout, Write};

use crate::Config;
use crate::query::{Confirm, Query};
use crate::tui::browser::Browser;
use crate::tui::editor::edit_in_external_editor;
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::tui::render::{render_browser, render_card};
use crate::tui::surface::{BrowserView, CardScreen, Surface};

/// Guard that ensures terminal state is restored even on panic
/// If the terminal is left in raw mode or alternate screen, the user's
/// terminal will be unusable.
struct TerminalGuard {
    /// Track if we successfully entered raw mode
    raw_mode_enabled: bool,
    /// Track if we successfully entered alternate screen
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    /// Initialize terminal state and return a guard
    /// The guard will restore terminal state when dropped (even on panic)
    fn new() -> Result<Self, TuiError> {
        let mut guard = Self {
            raw_mode_enabled: false,
            alternate_screen_enabled: false,
        };
        guard.enter()?;
        Ok(guard)
    }

    fn enter(&mut self) -> Result<(), TuiError> {
        if !self.raw_mode_enabled {
            enable_raw_mode()?;
            self.raw_mode_enabled = true;
        }
        if !self.alternate_screen_enabled {
            execute!(io::stdout(), EnterAlternateScreen)?;
            self.alternate_screen_enabled = true;
        }
        Ok(())
    }

    /// Manually restore terminal state (called on normal exit and around
    /// external editor runs). `enter` can take it back over.
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Ignore errors in drop - we're already in a cleanup path
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

/// Block until a key is pressed. Release and repeat events are skipped so
/// each press is seen once on every platform.
fn read_key_press() -> Result<KeyEvent, TuiError> {
    loop {
        if let Event::Key(key_event) = event::read()? {
            if key_event.kind == KeyEventKind::Press {
                return Ok(key_event);
            }
        }
    }
}

/// The real terminal, drawn with ratatui
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    guard: TerminalGuard,
    config: Config,
}

impl TerminalSurface {
    pub fn new(config: &Config) -> Result<Self, TuiError> {
        // Check terminal size before entering alternate screen
        // so the error is readable in the normal terminal
        let (width, height) = terminal_size()?;
        if width < Layout::MIN_WIDTH || height < Layout::MIN_HEIGHT {
            return Err(TuiError::RenderError(format!(
                "Terminal size too small. Current: {}x{}, Minimum required: {}x{}.",
                width, height, Layout::MIN_WIDTH, Layout::MIN_HEIGHT
            )));
        }

        let guard = TerminalGuard::new()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            guard,
            config: config.clone(),
        })
    }

    /// Leave the alternate screen and raw mode for good
    pub fn close(mut self) -> Result<(), TuiError> {
        self.terminal.show_cursor()?;
        self.guard.restore()
    }
}

impl Surface for TerminalSurface {
    fn draw_browser(&mut self, view: &BrowserView<'_>) -> Result<(), TuiError> {
        let config = &self.config;
        self.terminal.draw(|f| render_browser(f, view, config))?;
        Ok(())
    }

    fn show_card(&mut self, screen: &CardScreen<'_>) -> Result<(), TuiError> {
        let config = &self.config;
        self.terminal.draw(|f| render_card(f, screen, config))?;
        Ok(())
    }

    fn read_key(&mut self) -> Result<KeyEvent, TuiError> {
        let key = read_key_press()?;
        // raw mode swallows Ctrl+C, so treat it as quit
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(KeyEvent::from(KeyCode::Esc));
        }
        Ok(key)
    }

    fn edit_text(&mut self, text: &str) -> Result<String, TuiError> {
        // The editor needs the normal screen and cooked input
        self.guard.restore()?;
        let edited = edit_in_external_editor(&self.config.editor_command(), text);
        self.guard.enter()?;
        self.terminal.clear()?;
        edited
    }
}

/// Single key y/n prompt on the normal screen, used by destructive bulk commands
pub struct KeyConfirm;

impl Confirm for KeyConfirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        print!("{} ", prompt);
        io::stdout().flush()?;

        enable_raw_mode()?;
        let key = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(key),
                Ok(_) => continue,
                Err(e) => break Err(e),
            }
        };
        disable_raw_mode()?;
        println!();

        Ok(matches!(key?.code, KeyCode::Char('y') | KeyCode::Char('Y')))
    }
}

/// Browse (or review) a query in the terminal until the user quits
pub fn run_browser(query: Query<'_>, config: &Config, reviewing: bool) -> Result<Option<String>, TuiError> {
    let mut browser = Browser::new(query, config)?;
    if browser.ids().is_empty() {
        return Ok(Some("no cards".to_string()));
    }
    if reviewing {
        browser.start_reviewing();
    }

    let mut surface = TerminalSurface::new(config)?;
    let result = browser.run(&mut surface);
    surface.close()?;
    result?;

    Ok(browser.status().map(str::to_string))
}
