//! Reconciles a freshly fetched batch against the buffered tail.
//!
//! The live log endpoint only replays consistently at whole-second
//! granularity, so overlap is detected by content within the last buffered
//! second rather than by timestamp alone.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::DateTime;

use kubeconsole_types::LogItem;

use crate::chunked::ChunkedBuffer;

/// What a merge should append
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Prefix the novel items with a gap sentinel
    pub gap: bool,

    /// Items not yet buffered, in order
    pub novel: Vec<LogItem>,
}

impl MergePlan {
    /// Real items the plan adds (sentinel excluded)
    pub fn added(&self) -> usize {
        self.novel.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.gap && self.novel.is_empty()
    }

    /// Items to append, sentinel first when a gap was detected
    pub fn into_items(self) -> Vec<LogItem> {
        if self.gap {
            let mut items = Vec::with_capacity(self.novel.len() + 1);
            items.push(LogItem::missing_data());
            items.extend(self.novel);
            items
        } else {
            self.novel
        }
    }
}

/// Truncate an ISO-8601 timestamp to its whole second
///
/// `2024-01-15T10:30:00.123456789Z` becomes `2024-01-15T10:30:00`.
pub fn whole_second(time_stamp: &str) -> &str {
    let Some(t) = time_stamp.find('T') else {
        return time_stamp;
    };
    let end = time_stamp[t..]
        .find(['.', 'Z', 'z', '+', '-'])
        .map(|offset| t + offset)
        .unwrap_or(time_stamp.len());
    &time_stamp[..end]
}

/// Order two timestamps, by instant when both are RFC 3339 and by text otherwise
pub fn compare_stamps(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Order two timestamps by the whole second they fall in
///
/// RFC 3339 stamps are compared as instants, so zone suffixes do not matter.
pub fn compare_seconds(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(a), Ok(b)) => a.timestamp().cmp(&b.timestamp()),
        _ => whole_second(a).cmp(whole_second(b)),
    }
}

/// Work out which part of `incoming` is new relative to `buffer`
pub fn plan_merge(buffer: &ChunkedBuffer, incoming: Vec<LogItem>) -> MergePlan {
    let Some(last) = buffer.iter_rev().find(|item| !item.is_missing_data()) else {
        return MergePlan {
            gap: false,
            novel: incoming,
        };
    };
    let last_stamp = last.time_stamp();
    let in_final_second = |item: &LogItem| compare_seconds(item.time_stamp(), last_stamp).is_ge();

    // Buffered items in the final second, oldest first
    let mut window: Vec<&LogItem> = buffer
        .iter_rev()
        .filter(|item| !item.is_missing_data())
        .take_while(|item| in_final_second(item))
        .collect();
    window.reverse();

    // Anything from an earlier second is already covered
    let candidates: Vec<LogItem> = incoming
        .into_iter()
        .filter(|item| !item.is_missing_data() && in_final_second(item))
        .collect();

    let anchor = candidates.iter().enumerate().find_map(|(k, item)| {
        window
            .iter()
            .position(|buffered| *buffered == item)
            .map(|w| (k, w))
    });

    let start = match anchor {
        Some((mut k, mut w)) => {
            k += 1;
            w += 1;
            while k < candidates.len() && w < window.len() && candidates[k] == *window[w] {
                k += 1;
                w += 1;
            }
            k
        }
        None => 0,
    };

    let known: HashSet<&LogItem> = window.iter().copied().collect();
    let novel: Vec<LogItem> = candidates
        .into_iter()
        .skip(start)
        .filter(|item| {
            !known.contains(item) && compare_stamps(item.time_stamp(), last_stamp).is_ge()
        })
        .collect();

    MergePlan {
        gap: anchor.is_none() && !novel.is_empty(),
        novel,
    }
}
