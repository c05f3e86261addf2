//! Text formatting for bot messages.

use std::collections::HashMap;

use crate::file::file_extension;

/// Number of cells in the usage progress bar.
const PROGRESS_CELLS: usize = 10;

/// Extension label for files without one.
const UNKNOWN_EXTENSION: &str = "unknown";

/// Format a byte count for humans.
pub fn format_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.2} GB", size / GB)
    }
}

/// Render `percent` as `[■■■□□□□□□□]`.
pub fn progress_bar(percent: f64) -> String {
    let filled = if percent.is_finite() && percent > 0.0 {
        ((percent / 10.0).floor() as usize).min(PROGRESS_CELLS)
    } else {
        0
    };

    let mut bar = String::with_capacity(PROGRESS_CELLS * 3 + 2);
    bar.push('[');
    bar.push_str(&"■".repeat(filled));
    bar.push_str(&"□".repeat(PROGRESS_CELLS - filled));
    bar.push(']');
    bar
}

/// Most common extensions among `filenames`, at most `limit` of them.
///
/// Ties are ordered by extension so the output is stable.
pub fn top_extensions<'a, I>(filenames: I, limit: usize) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in filenames {
        let ext = file_extension(name).unwrap_or_else(|| UNKNOWN_EXTENSION.to_string());
        *counts.entry(ext).or_default() += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);
    sorted
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024 + 512 * 1024 * 1024), "5.50 GB");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), "[□□□□□□□□□□]");
        assert_eq!(progress_bar(9.9), "[□□□□□□□□□□]");
        assert_eq!(progress_bar(35.0), "[■■■□□□□□□□]");
        assert_eq!(progress_bar(100.0), "[■■■■■■■■■■]");
        assert_eq!(progress_bar(250.0), "[■■■■■■■■■■]");
        assert_eq!(progress_bar(-5.0), "[□□□□□□□□□□]");
        assert_eq!(progress_bar(f64::NAN), "[□□□□□□□□□□]");
    }

    #[test]
    fn test_top_extensions() {
        let names = [
            "a.jpg", "b.JPG", "c.png", "notes", "d.pdf", "e.pdf", "f.pdf", "g.txt", "h.zip",
        ];
        let top = top_extensions(names.iter().copied(), 5);

        assert_eq!(top.len(), 5);
        assert_eq!(top[0], ("pdf".to_string(), 3));
        assert_eq!(top[1], ("jpg".to_string(), 2));
        // ties sorted by name
        assert_eq!(top[2], ("png".to_string(), 1));
        assert_eq!(top[3], ("txt".to_string(), 1));
        assert_eq!(top[4], ("unknown".to_string(), 1));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_html("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short.txt", 20), "short.txt");
        let cut = truncate("a-very-long-file-name-indeed.txt", 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with('…'));
    }
}
