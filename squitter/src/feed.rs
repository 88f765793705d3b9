//! Raw feed line handling.
//!
//! Accepts the line shapes a capture file or a dump1090 raw port produce:
//! plain hex, `*hex;`, and `hex;timestamp`. Malformed hex is passed through
//! so the session can report it with its original text.

/// Strip framing from one feed line.
///
/// Returns the frame text and the timestamp carried on the line, if any.
/// Blank lines and `#` comments yield `None`.
pub fn clean_line(line: &str) -> Option<(&str, Option<f64>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    // dump1090 raw output: *<hex>;
    if let Some(inner) = line.strip_prefix('*') {
        let inner = inner.strip_suffix(';').unwrap_or(inner);
        return Some((inner.trim(), None));
    }

    // Capture files: <hex>;<timestamp>
    if let Some((hex, ts)) = line.split_once(';') {
        return Some((hex.trim(), ts.trim().parse::<f64>().ok()));
    }

    Some((line, None))
}

/// Arrival times for lines that may or may not carry their own timestamp.
///
/// Lines without one are spaced `step` seconds after the previous line.
#[derive(Debug, Clone)]
pub struct Timeline {
    next: f64,
    step: f64,
}

impl Default for Timeline {
    fn default() -> Self {
        Timeline::new(0.1)
    }
}

impl Timeline {
    pub fn new(step: f64) -> Self {
        Timeline { next: 0.0, step }
    }

    pub fn stamp(&mut self, explicit: Option<f64>) -> f64 {
        let ts = explicit.unwrap_or(self.next);
        self.next = ts + self.step;
        ts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = "8D4840D6202CC371C32CE0576098";

    #[test]
    fn test_clean_line_plain() {
        assert_eq!(clean_line(FRAME), Some((FRAME, None)));
    }

    #[test]
    fn test_clean_line_dump1090() {
        assert_eq!(clean_line("*8D4840D6202CC371C32CE0576098;"), Some((FRAME, None)));
    }

    #[test]
    fn test_clean_line_with_timestamp() {
        assert_eq!(
            clean_line("8D4840D6202CC371C32CE0576098;1700000000.25"),
            Some((FRAME, Some(1_700_000_000.25)))
        );
    }

    #[test]
    fn test_clean_line_bad_timestamp() {
        assert_eq!(clean_line(&format!("{FRAME};soon")), Some((FRAME, None)));
    }

    #[test]
    fn test_clean_line_whitespace() {
        assert_eq!(clean_line("  8D4840D6202CC371C32CE0576098  \r"), Some((FRAME, None)));
    }

    #[test]
    fn test_clean_line_comment_and_empty() {
        assert!(clean_line("# comment").is_none());
        assert!(clean_line("").is_none());
        assert!(clean_line("   ").is_none());
    }

    #[test]
    fn test_clean_line_keeps_garbage() {
        // Left for the session to report
        assert_eq!(clean_line("not hex"), Some(("not hex", None)));
        assert_eq!(clean_line("*8D4840;"), Some(("8D4840", None)));
    }

    #[test]
    fn test_timeline_auto_increment() {
        let mut timeline = Timeline::new(0.5);
        assert_eq!(timeline.stamp(None), 0.0);
        assert_eq!(timeline.stamp(None), 0.5);
        assert_eq!(timeline.stamp(Some(10.0)), 10.0);
        assert_eq!(timeline.stamp(None), 10.5);
    }
}
