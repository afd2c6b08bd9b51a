//! Text helpers for outgoing Telegram messages.

/// Telegram caps messages at 4096 characters; stay under it so HTML tags
/// and markers fit.
pub const MAX_MESSAGE_LEN: usize = 3500;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Split text into Telegram-sized chunks.
///
/// Prefers sentence and line boundaries over hard cuts, but only when the
/// boundary is far enough in that the chunk is not wastefully short.
pub fn split_message(text: &str) -> Vec<String> {
    split_with_limit(text, MAX_MESSAGE_LEN)
}

fn split_with_limit(text: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.len() > max_len {
        let window_end = floor_char_boundary(rest, max_len);
        let window = &rest[..window_end];

        let mut split_at = window_end;
        for separator in [". ", "! ", "? ", "\n\n", "\n", " "] {
            if let Some(pos) = window.rfind(separator) {
                if pos > 0 && pos > max_len * 7 / 10 {
                    split_at = pos + separator.len();
                    break;
                }
            }
        }

        let part = rest[..split_at].trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        rest = rest[split_at..].trim_start();
    }

    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Truncate to at most `max_len` bytes on a char boundary, appending an
/// ellipsis when anything was cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let end = floor_char_boundary(text, max_len);
    format!("{}...", &text[..end])
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut index = index.min(s.len());
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    if index == 0 {
        // A single character wider than the window; take it whole rather
        // than loop forever.
        s.chars().next().map_or(0, char::len_utf8)
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b && b > c"), "a &lt; b &amp;&amp; b &gt; c");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_short_text_is_one_part() {
        let parts = split_message("hello world");
        assert_eq!(parts, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_empty_text_yields_no_parts() {
        assert!(split_message("   ").is_empty());
    }

    #[test]
    fn test_splits_at_sentence_boundary() {
        let text = "First sentence is rather long here. Second one follows after it.";
        let parts = split_with_limit(text, 40);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "First sentence is rather long here.");
        assert_eq!(parts[1], "Second one follows after it.");
    }

    #[test]
    fn test_boundary_too_early_forces_hard_cut() {
        // The only space sits well before 70% of the window, so the split
        // falls back to a cut at the limit.
        let text = format!("ab {}", "x".repeat(60));
        let parts = split_with_limit(&text, 20);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| p.len() <= 20));
    }

    #[test]
    fn test_all_parts_within_limit() {
        let text = "A sentence of modest length sits here. ".repeat(300);
        let parts = split_message(&text);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| p.len() <= MAX_MESSAGE_LEN));
        assert!(parts.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_multibyte_text_never_splits_inside_a_char() {
        let text = "Привет! Это длинное сообщение от агента. ".repeat(40);
        let parts = split_with_limit(&text, 100);
        // Every part is valid UTF-8 by construction; verify nothing was
        // dropped beyond whitespace.
        let rejoined: String = parts.join(" ");
        assert_eq!(
            rejoined.split_whitespace().collect::<Vec<_>>(),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
        // Does not cut inside a multibyte char.
        assert_eq!(truncate("ééé", 3), "é...");
    }
}
