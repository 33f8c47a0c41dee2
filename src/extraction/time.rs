/// Clock-string duration parsing
use regex::Regex;
use std::sync::OnceLock;

/// Parse a colon-delimited clock string into whole seconds.
///
/// Accepts `H:MM:SS`, `M:SS` and bare `S`. Anything else yields `0`.
pub fn parse_duration(text: &str) -> u64 {
    try_parse_duration(text).unwrap_or(0)
}

/// Like [`parse_duration`] but distinguishes invalid input from a zero duration
pub fn try_parse_duration(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<u64> = trimmed
        .split(':')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [hours, minutes, seconds] => Some(hours * 3600 + minutes * 60 + seconds),
        [minutes, seconds] => Some(minutes * 60 + seconds),
        [seconds] => Some(*seconds),
        _ => None,
    }
}

/// True when `text` is a bare clock string such as `4:05` or `1:02:03`
pub fn is_clock_text(text: &str) -> bool {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    let clock = CLOCK
        .get_or_init(|| Regex::new(r"^\d{1,3}(?::\d{1,2}){0,2}$").expect("clock pattern is valid"));
    clock.is_match(text.trim())
}

/// Remove the first matching label prefix (case-insensitive), e.g. `"Duration: 4:05"`
pub fn strip_label<'a>(text: &'a str, labels: &[String]) -> &'a str {
    let trimmed = text.trim();
    for label in labels {
        if label.is_empty() || trimmed.len() < label.len() {
            continue;
        }
        if let Some(head) = trimmed.get(..label.len()) {
            if head.eq_ignore_ascii_case(label) {
                return trimmed[label.len()..].trim();
            }
        }
    }
    trimmed
}
