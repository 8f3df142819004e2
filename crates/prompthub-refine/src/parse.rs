/// Strip the wrapping models like to add around a bare answer. Returns
/// `None` when nothing is left.
pub fn clean_output(raw: &str) -> Option<String> {
    let mut text = raw.trim();

    // Fenced block, with or without a language tag
    if let Some(inner) = text.strip_prefix("```").and_then(|s| s.strip_suffix("```")) {
        text = match inner.split_once('\n') {
            Some((lang, body)) if !lang.contains(' ') => body,
            _ => inner,
        }
        .trim();
    }

    for label in ["Refined prompt:", "Improved prompt:"] {
        if let Some(head) = text.get(..label.len()) {
            if head.eq_ignore_ascii_case(label) {
                text = text[label.len()..].trim_start();
                break;
            }
        }
    }

    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if let Some(inner) = text.strip_prefix(open).and_then(|s| s.strip_suffix(close)) {
            text = inner.trim();
            break;
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
