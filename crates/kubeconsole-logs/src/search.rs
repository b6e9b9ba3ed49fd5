use std::collections::VecDeque;

use kubeconsole_types::LogItem;

/// Incrementally maintained set of buffer positions matching a search term
///
/// Matches are stored as absolute sequence numbers (position since the last
/// reset). `base` counts items evicted from the front of the buffer, so the
/// flat index of a match is `seq - base` and eviction only has to advance
/// `base` and drop matches that fell below it.
#[derive(Debug, Default)]
pub struct SearchIndex {
    /// Active term (None = no search)
    term: Option<String>,

    /// Matching sequence numbers, ascending
    matches: VecDeque<usize>,

    /// Sequence number of the oldest buffered item
    base: usize,

    /// Sequence number the next appended item will get
    next_seq: usize,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current term, if any
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.term.is_some()
    }

    /// Check if an item matches the given term
    ///
    /// Case-sensitive substring test on the record text. The gap sentinel
    /// never matches.
    pub fn item_matches(term: &str, item: &LogItem) -> bool {
        !item.is_missing_data() && item.log_data().contains(term)
    }

    /// Replace the term and rescan the given (current) buffer contents
    pub fn change_term<'a, I>(&mut self, term: &str, buffered: I)
    where
        I: IntoIterator<Item = &'a LogItem>,
    {
        self.matches.clear();
        if term.is_empty() {
            self.term = None;
            return;
        }

        self.term = Some(term.to_string());
        for (offset, item) in buffered.into_iter().enumerate() {
            if Self::item_matches(term, item) {
                self.matches.push_back(self.base + offset);
            }
        }
    }

    /// Record newly appended items, testing only those against the term
    pub fn on_append<'a, I>(&mut self, appended: I)
    where
        I: IntoIterator<Item = &'a LogItem>,
    {
        for item in appended {
            if let Some(term) = &self.term {
                if Self::item_matches(term, item) {
                    self.matches.push_back(self.next_seq);
                }
            }
            self.next_seq += 1;
        }
    }

    /// Shift positions down after `count` items were dropped from the front
    pub fn on_evict(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.base += count;
        while self.matches.front().is_some_and(|&seq| seq < self.base) {
            self.matches.pop_front();
        }
    }

    /// Forget all positions, keeping the term
    pub fn on_clear(&mut self) {
        self.matches.clear();
        self.base = 0;
        self.next_seq = 0;
    }

    /// Number of matching items
    pub fn num_matches(&self) -> usize {
        self.matches.len()
    }

    /// Flat buffer indexes of all matches, ascending
    pub fn matching_indexes(&self) -> Vec<usize> {
        self.matches.iter().map(|seq| seq - self.base).collect()
    }

    /// First match strictly after `index`, wrapping to the first match
    pub fn next_match(&self, index: usize) -> Option<usize> {
        let target = self.base + index;
        let pos = self.matches.partition_point(|&seq| seq <= target);
        self.matches
            .get(pos)
            .or_else(|| self.matches.front())
            .map(|seq| seq - self.base)
    }

    /// Last match strictly before `index`, wrapping to the last match
    pub fn previous_match(&self, index: usize) -> Option<usize> {
        let target = self.base + index;
        let pos = self.matches.partition_point(|&seq| seq < target);
        pos.checked_sub(1)
            .and_then(|p| self.matches.get(p))
            .or_else(|| self.matches.back())
            .map(|seq| seq - self.base)
    }

    /// Ordinal (1-based) of the match at `index`, for "k of n" displays
    pub fn match_ordinal(&self, index: usize) -> Option<usize> {
        let target = self.base + index;
        self.matches
            .binary_search(&target)
            .ok()
            .map(|pos| pos + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(texts: &[&str]) -> Vec<LogItem> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| LogItem::new(format!("2024-01-15T10:30:{:02}Z", i), *text))
            .collect()
    }

    #[test]
    fn test_incremental_append() {
        let mut index = SearchIndex::new();
        index.change_term("o", std::iter::empty());

        let batch = items(&["foo", "bar", "boo", "baz"]);
        index.on_append(&batch);
        assert_eq!(index.num_matches(), 2);
        assert_eq!(index.matching_indexes(), vec![0, 2]);

        let batch = items(&["zoo", "qux"]);
        index.on_append(&batch);
        assert_eq!(index.matching_indexes(), vec![0, 2, 4]);
    }

    #[test]
    fn test_eviction_shifts_indexes() {
        let mut index = SearchIndex::new();
        index.change_term("o", std::iter::empty());
        index.on_append(&items(&["foo", "bar", "boo", "baz", "zoo"]));

        index.on_evict(2);
        assert_eq!(index.num_matches(), 2);
        assert_eq!(index.matching_indexes(), vec![0, 2]);

        index.on_evict(3);
        assert_eq!(index.num_matches(), 0);
    }

    #[test]
    fn test_change_term_rescans_current_contents() {
        let buffered = items(&["Error one", "fine", "error two"]);
        let mut index = SearchIndex::new();
        index.on_append(&buffered);
        assert_eq!(index.num_matches(), 0);

        index.change_term("error", &buffered);
        assert_eq!(index.matching_indexes(), vec![2]);

        index.change_term("", &buffered);
        assert!(!index.is_active());
        assert_eq!(index.num_matches(), 0);
    }

    #[test]
    fn test_rescan_after_eviction_uses_base() {
        let all = items(&["a", "b", "ab", "b"]);
        let mut index = SearchIndex::new();
        index.on_append(&all);
        index.on_evict(2);

        index.change_term("b", &all[2..]);
        assert_eq!(index.matching_indexes(), vec![0, 1]);

        index.on_append(&items(&["bb"]));
        assert_eq!(index.matching_indexes(), vec![0, 1, 2]);
    }

    #[test]
    fn test_sentinel_never_matches() {
        let mut index = SearchIndex::new();
        index.change_term("missing", std::iter::empty());
        index.on_append(&[LogItem::missing_data()]);
        assert_eq!(index.num_matches(), 0);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut index = SearchIndex::new();
        index.change_term("x", std::iter::empty());
        index.on_append(&items(&["x", "-", "x", "-", "x"]));

        assert_eq!(index.next_match(0), Some(2));
        assert_eq!(index.next_match(4), Some(0));
        assert_eq!(index.previous_match(2), Some(0));
        assert_eq!(index.previous_match(0), Some(4));
        assert_eq!(index.match_ordinal(2), Some(2));
        assert_eq!(index.match_ordinal(1), None);
    }

    #[test]
    fn test_navigation_without_matches() {
        let index = SearchIndex::new();
        assert_eq!(index.next_match(0), None);
        assert_eq!(index.previous_match(0), None);
    }
}
