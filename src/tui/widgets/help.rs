use ratatui::text::Line;

/// Grading keys, shown under the answer
const GRADE_HELP: &[(&str, &str)] = &[
    ("D", "delete"),
    ("1", "again"),
    ("2", "hard"),
    ("3 Enter Space", "good"),
    ("4", "easy"),
    ("P 0", "preview"),
    ("Q Escape", "quit"),
];

pub fn grade_help_lines() -> Vec<Line<'static>> {
    GRADE_HELP
        .iter()
        .map(|(keys, grade)| Line::from(format!("{:<22} {}", keys, grade)))
        .collect()
}
