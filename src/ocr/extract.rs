use regex::Regex;

/// `completed / total`, tolerating spaces around the slash.
const COMPLETION_PATTERN: &str = r"(\d+)\s*/\s*(\d+)";

/// Parses a completion counter such as `3 / 5` from OCR text.
///
/// Returns `(completed, total)` for the first counter found. Counters with a
/// zero total are rejected as misreads.
pub fn parse_completion(text: &str) -> Option<(u32, u32)> {
    let regex = Regex::new(COMPLETION_PATTERN).ok()?;
    let caps = regex.captures(text)?;
    let done: u32 = caps[1].parse().ok()?;
    let total: u32 = caps[2].parse().ok()?;
    (total > 0).then_some((done, total))
}

/// Whether a parsed counter still has work left.
pub fn is_incomplete((done, total): (u32, u32)) -> bool {
    done < total
}
