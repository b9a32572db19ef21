use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::style::{Modifier, Style};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span, Text};
use crate::Config;
use crate::models::CardKind;
use crate::tui::surface::CardScreen;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::help::grade_help_lines;
use crate::tui::widgets::tags::format_tags_brackets;

/// Lines of a card face: text, tags, media markers and, once graded, the help
pub fn card_text<'a>(screen: &'a CardScreen<'_>, dim: Style) -> Text<'a> {
    let mut lines: Vec<Line> = screen.lines.iter().map(|line| Line::from(line.as_str())).collect();

    for label in &screen.media {
        lines.push(Line::from(Span::styled(format!("[{} attached]", label), dim)));
    }

    if !screen.tags.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(format_tags_brackets(screen.tags), dim)));
    }

    if screen.grading {
        lines.push(Line::default());
        if screen.kind == CardKind::Verses {
            lines.push(Line::from("[END]"));
            lines.push(Line::default());
        }
        lines.extend(grade_help_lines().into_iter().map(|line| line.style(dim)));
    }

    Text::from(lines)
}

pub fn render_card_view(f: &mut Frame, area: Rect, screen: &CardScreen<'_>, config: &Config) {
    if area.width < 2 || area.height < 2 {
        return;
    }

    let fg = parse_color(&config.theme.fg);
    let bg = parse_color(&config.theme.bg);
    let dim = Style::default().fg(parse_color(&config.theme.deleted)).add_modifier(Modifier::DIM);

    let title = match screen.kind {
        CardKind::Basic => "Card",
        CardKind::Verses => "Verses",
    };

    // Keep the newest lines in view when a long poem outgrows the screen
    let text = card_text(screen, dim);
    let viewport_height = area.height.saturating_sub(2) as usize;
    let overflow = text.lines.len().saturating_sub(viewport_height);

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(fg).bg(bg))
        .scroll((u16::try_from(overflow).unwrap_or(u16::MAX), 0))
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);
}
