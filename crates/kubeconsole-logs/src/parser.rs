use chrono::DateTime;

use kubeconsole_types::LogItem;

/// Parser for timestamp-prefixed container log output
pub struct LogParser;

impl LogParser {
    /// Split a fetched log body into items, one per line
    ///
    /// Lines without a timestamp prefix (wrapped output) inherit the previous
    /// line's timestamp so they stay in place when batches are merged.
    pub fn parse_body(body: &str) -> Vec<LogItem> {
        let mut items = Vec::new();
        let mut last_stamp = String::new();

        for raw in body.lines() {
            let raw = raw.trim_end_matches('\r');
            if raw.is_empty() {
                continue;
            }
            match Self::extract_k8s_timestamp(raw) {
                (Some(stamp), content) => {
                    last_stamp = stamp.to_string();
                    items.push(LogItem::new(stamp, content));
                }
                (None, content) => items.push(LogItem::new(last_stamp.clone(), content)),
            }
        }

        items
    }

    /// Parse a single line; the timestamp is empty when absent
    pub fn parse_line(raw: &str) -> LogItem {
        let (stamp, content) = Self::extract_k8s_timestamp(raw);
        LogItem::new(stamp.unwrap_or_default(), content)
    }

    /// Extract Kubernetes timestamp from the beginning of a log line
    ///
    /// The timestamp is kept verbatim (RFC3339Nano) so buffered items compare
    /// byte-for-byte with later fetches of the same line.
    fn extract_k8s_timestamp(raw: &str) -> (Option<&str>, &str) {
        // K8s timestamp format: 2024-01-15T10:30:00.123456789Z (30 chars)
        // Sometimes shorter: 2024-01-15T10:30:00Z (20 chars)
        if raw.len() >= 20 {
            let search_end = Self::floor_char_boundary(raw, 36.min(raw.len()));
            if let Some(space) = raw.get(..search_end).and_then(|s| s.find(' ')) {
                let stamp = &raw[..space];
                if DateTime::parse_from_rfc3339(stamp).is_ok() {
                    return (Some(stamp), &raw[space + 1..]);
                }
            }
        }
        (None, raw)
    }

    /// Find the largest valid char boundary <= the given byte index
    fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
        if idx >= s.len() {
            return s.len();
        }
        while idx > 0 && !s.is_char_boundary(idx) {
            idx -= 1;
        }
        idx
    }
}
