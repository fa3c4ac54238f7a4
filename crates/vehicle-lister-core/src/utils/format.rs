/// Remove every whitespace character from a string.
/// Search tokens and stored names are compared in this form ("E 46" == "E46").
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Remove embedded line breaks from a selected label.
/// Labels taken from rendered lists can carry stray `\r` / `\n` characters.
pub fn strip_line_breaks(s: &str) -> String {
    s.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Case-insensitive prefix check without allocating for the ASCII case.
pub fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    if prefix.is_ascii() && haystack.is_ascii() {
        return haystack.len() >= prefix.len()
            && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes());
    }
    haystack.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// Case-insensitive equality, used for indexed exact-match lookups.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        a.eq_ignore_ascii_case(b)
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

/// Normalized key for case-insensitive indexes and per-brand cache entries.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Parse the leading integer of a string the way catalog data expects:
/// leading whitespace is skipped, an optional sign is honored, and parsing
/// stops at the first non-digit. Returns None when no digits are found.
///
/// `"2005/12 XX"` -> 2005, `" 132kW"` -> 132, `"n/a"` -> None
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits: &str = {
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    };

    if digits.is_empty() {
        return None;
    }

    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Render an age in minutes as a short "5m ago" / "2h ago" / "3d ago" label.
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Negative ages come from clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}
