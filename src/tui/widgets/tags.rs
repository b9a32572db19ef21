/// Parse tags from editor text, separated by commas or whitespace
/// Returns a vector of trimmed, non-empty tag strings in first-seen order
pub fn parse_tags(tags_str: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in tags_str.split(|c: char| c == ',' || c.is_whitespace()) {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Format tags as a string with brackets: [tag1] [tag2] [tag3]
pub fn format_tags_brackets(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("[{}]", tag))
        .collect::<Vec<_>>()
        .join(" ")
}
