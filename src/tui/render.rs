use ratatui::Frame;
use ratatui::widgets::{Block, Borders};
use ratatui::style::Style;
use crate::Config;
use crate::tui::Layout;
use crate::tui::surface::{BrowserView, CardScreen};
use crate::tui::widgets::{
    card_list::render_card_list,
    card_view::render_card_view,
    color::parse_color,
    status_bar::render_status_bar,
};
use crate::utils::format_key_binding_for_display;

fn render_outer_block(f: &mut Frame, config: &Config) {
    let fg_color = parse_color(&config.theme.fg);
    let bg_color = parse_color(&config.theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("sprout")
        .title_alignment(ratatui::layout::Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());
}

pub fn render_browser(f: &mut Frame, view: &BrowserView<'_>, config: &Config) {
    let rows = u16::try_from(view.height.min(view.total.max(1))).unwrap_or(u16::MAX);
    let layout = Layout::browser(f.area(), rows);

    render_outer_block(f, config);
    render_card_list(f, layout.main_area, view, config);
    render_status_bar(f, layout.status_area, view.status, &browser_key_hints(config), config);
}

pub fn render_card(f: &mut Frame, screen: &CardScreen<'_>, config: &Config) {
    let layout = Layout::card(f.area());

    render_outer_block(f, config);
    render_card_view(f, layout.main_area, screen, config);

    let hint = if screen.grading { "1-4: Grade" } else { "Any key: Continue" };
    render_status_bar(f, layout.status_area, None, &[hint.to_string(), "q: Quit".to_string()], config);
}

fn browser_key_hints(config: &Config) -> Vec<String> {
    let keys = &config.key_bindings;
    [
        (&keys.quit, "Quit"),
        (&keys.review, "Review"),
        (&keys.edit, "Edit"),
        (&keys.edit_tags, "Tags"),
        (&keys.toggle_delete, "Delete"),
        (&keys.postpone, "Postpone"),
        (&keys.new_basic, "New card"),
        (&keys.new_verses, "New verses"),
    ]
    .iter()
    .map(|(key, action)| format!("{}: {}", format_key_binding_for_display(key), action))
    .collect()
}
