/// Trim recognised text and collapse every run of whitespace into one
/// character: a newline when the run spans lines, a space otherwise.
pub fn clean_recognized(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending: Option<char> = None;
    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            pending = match pending {
                Some('\n') => Some('\n'),
                _ if ch == '\n' || ch == '\r' => Some('\n'),
                _ => Some(' '),
            };
            continue;
        }
        if let Some(ws) = pending.take() {
            out.push(ws);
        }
        out.push(ch);
    }
    out
}

/// Reduce OCR output of a numeric field to its digits.
///
/// Only the first line is considered. `o` and `D` are read as `0` since the
/// card fonts make them indistinguishable; every other non-digit is dropped.
pub fn normalize_numeric(text: &str) -> String {
    let first = text.split('\n').next().unwrap_or_default();
    first
        .chars()
        .map(|ch| match ch {
            'o' | 'D' => '0',
            other => other,
        })
        .filter(|ch| ch.is_ascii_digit())
        .collect()
}
