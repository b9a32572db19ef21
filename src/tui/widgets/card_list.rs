use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use ratatui::style::{Modifier, Style};
use ratatui::Frame;
use ratatui::layout::Rect;
use crate::Config;
use crate::tui::surface::{BrowserView, CardRow};
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};

/// Truncate to `max_width` characters, marking the cut with an ellipsis
fn truncate(text: &str, max_width: usize) -> String {
    if text.chars().count() > max_width {
        text.chars().take(max_width.saturating_sub(3)).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

fn row_style(row: &CardRow, config: &Config) -> Style {
    let theme = &config.theme;
    if row.deleted {
        Style::default().fg(parse_color(&theme.deleted)).add_modifier(Modifier::CROSSED_OUT)
    } else if row.due {
        Style::default().fg(parse_color(&theme.due))
    } else {
        Style::default().fg(parse_color(&theme.fg))
    }
}

pub fn render_card_list(f: &mut Frame, area: Rect, view: &BrowserView<'_>, config: &Config) {
    // 2 for borders, 2 for padding
    let max_width = area.width.saturating_sub(4) as usize;

    let highlight_bg = parse_color(&config.theme.highlight_bg);
    let highlight_fg = get_contrast_text_color(highlight_bg);

    let items: Vec<ListItem> = view
        .rows
        .iter()
        .map(|row| ListItem::new(truncate(&row.summary, max_width)).style(row_style(row, config)))
        .collect();

    let title = match (view.reviewing, view.position_label()) {
        (true, Some(label)) => format!("Reviewing - {}", label),
        (true, None) => "Reviewing".to_string(),
        (false, Some(label)) => label,
        (false, None) => "Cards".to_string(),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(parse_color(&config.theme.fg)).bg(parse_color(&config.theme.bg)))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg).add_modifier(Modifier::BOLD));

    // rows start at the frame, so the selection is relative to the first row
    let first = view.rows.first().map(|row| row.position - 1).unwrap_or(0);
    let mut state = ListState::default();
    state.select(view.selected.checked_sub(first));

    f.render_stateful_widget(list, area, &mut state);
}
