use std::collections::VecDeque;

use kubeconsole_types::LogItem;

/// Fixed-capacity slice of the buffer with its byte total cached
#[derive(Debug)]
struct Chunk {
    items: Vec<LogItem>,
    bytes: usize,
}

impl Chunk {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            bytes: 0,
        }
    }
}

/// Byte-budgeted ring of fixed-capacity chunks
///
/// Items are appended to the last chunk and a new chunk is opened once it is
/// full, so every chunk except the last always holds exactly `chunk_size`
/// items. Eviction drops whole chunks from the front, which keeps that
/// property and lets a flat index resolve to `(chunk, offset)` by division.
#[derive(Debug)]
pub struct ChunkedBuffer {
    /// Internal storage, oldest chunk first
    chunks: VecDeque<Chunk>,

    /// Items per chunk
    chunk_size: usize,

    /// Byte budget restored after every append
    max_bytes: usize,

    /// Sum of chunk byte totals
    total_bytes: usize,

    /// Total item count
    len: usize,
}

impl ChunkedBuffer {
    /// Create a new buffer. A zero chunk size is treated as one.
    pub fn new(max_bytes: usize, chunk_size: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            chunk_size: chunk_size.max(1),
            max_bytes,
            total_bytes: 0,
            len: 0,
        }
    }

    /// Append items in order, then evict from the front until the budget holds.
    ///
    /// Returns the number of items evicted.
    pub fn append_many<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = LogItem>,
    {
        for item in items {
            self.push(item);
        }
        self.evict_over_budget()
    }

    fn push(&mut self, item: LogItem) {
        let needs_chunk = self
            .chunks
            .back()
            .is_none_or(|chunk| chunk.items.len() >= self.chunk_size);
        if needs_chunk {
            self.chunks.push_back(Chunk::with_capacity(self.chunk_size));
        }

        let size = item.byte_size();
        if let Some(chunk) = self.chunks.back_mut() {
            chunk.bytes += size;
            chunk.items.push(item);
            self.total_bytes += size;
            self.len += 1;
        }
    }

    /// Drop whole chunks from the front while over budget
    fn evict_over_budget(&mut self) -> usize {
        let mut evicted = 0;
        while self.total_bytes > self.max_bytes {
            let Some(chunk) = self.chunks.pop_front() else {
                break;
            };
            self.total_bytes -= chunk.bytes;
            self.len -= chunk.items.len();
            evicted += chunk.items.len();
        }
        evicted
    }

    /// Random access by flat index
    pub fn get(&self, index: usize) -> Option<&LogItem> {
        if index >= self.len {
            return None;
        }
        let chunk = self.chunks.get(index / self.chunk_size)?;
        chunk.items.get(index % self.chunk_size)
    }

    /// Most recently appended item
    pub fn last(&self) -> Option<&LogItem> {
        self.chunks.back().and_then(|chunk| chunk.items.last())
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogItem> {
        self.chunks.iter().flat_map(|chunk| chunk.items.iter())
    }

    /// Iterate newest to oldest
    pub fn iter_rev(&self) -> impl Iterator<Item = &LogItem> {
        self.iter().rev()
    }

    /// Total item count across chunks
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Drop all chunks
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> LogItem {
        LogItem::new(format!("2024-01-15T10:30:0{}.000Z", n), format!("line {}", n))
    }

    #[test]
    fn test_get_across_chunk_boundary() {
        let mut buffer = ChunkedBuffer::new(usize::MAX, 2);
        buffer.append_many((0..4).map(item));

        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.get(1), Some(&item(1)));
        assert_eq!(buffer.get(2), Some(&item(2)));
        assert_eq!(buffer.get(3), Some(&item(3)));
    }

    #[test]
    fn test_get_out_of_range() {
        let mut buffer = ChunkedBuffer::new(usize::MAX, 3);
        assert!(buffer.get(0).is_none());

        buffer.append_many((0..2).map(item));
        assert!(buffer.get(2).is_none());
        assert!(buffer.get(usize::MAX).is_none());
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let size = item(0).byte_size();
        let mut buffer = ChunkedBuffer::new(size * 3, 1);
        let evicted = buffer.append_many((0..5).map(item));

        assert_eq!(evicted, 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get(0), Some(&item(2)));
        assert_eq!(buffer.get(2), Some(&item(4)));
        assert!(buffer.total_bytes() <= buffer.max_bytes());
    }

    #[test]
    fn test_eviction_is_whole_chunk() {
        let size = item(0).byte_size();
        // Room for three items, but chunks hold two
        let mut buffer = ChunkedBuffer::new(size * 3, 2);
        let evicted = buffer.append_many((0..4).map(item));

        assert_eq!(evicted, 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(0), Some(&item(2)));
    }

    #[test]
    fn test_oversized_batch_can_empty_buffer() {
        let big = LogItem::new("2024-01-15T10:30:00Z", "x".repeat(100));
        let mut buffer = ChunkedBuffer::new(50, 4);
        let evicted = buffer.append_many(vec![big]);

        assert_eq!(evicted, 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_bytes(), 0);
    }

    #[test]
    fn test_iter_rev_and_last() {
        let mut buffer = ChunkedBuffer::new(usize::MAX, 2);
        buffer.append_many((0..3).map(item));

        assert_eq!(buffer.last(), Some(&item(2)));
        let newest_first: Vec<_> = buffer.iter_rev().cloned().collect();
        assert_eq!(newest_first, vec![item(2), item(1), item(0)]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = ChunkedBuffer::new(usize::MAX, 2);
        buffer.append_many((0..5).map(item));
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.chunk_count(), 0);
        assert_eq!(buffer.total_bytes(), 0);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let mut buffer = ChunkedBuffer::new(usize::MAX, 0);
        buffer.append_many((0..2).map(item));
        assert_eq!(buffer.chunk_size(), 1);
        assert_eq!(buffer.get(1), Some(&item(1)));
    }
}
