/// Mask a secret for display, keeping the first four characters.
pub fn redact(value: &str) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(4).collect();
    if chars.next().is_none() {
        "***".to_string()
    } else {
        format!("{head}***")
    }
}

/// Truncate to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let keep = s[..idx]
                .char_indices()
                .nth(max_chars.saturating_sub(3))
                .map_or(idx, |(i, _)| i);
            format!("{}...", &s[..keep])
        }
        None => s.to_string(),
    }
}

/// Format a duration as `H:MM:SS`.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
