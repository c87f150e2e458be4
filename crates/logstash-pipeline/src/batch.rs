/// Fixed-capacity accumulator for encoded records awaiting a push.
///
/// Owned exclusively by the delivery worker. The filled prefix survives a failed push
/// (when the purge policy allows it) and is retried before new records are appended,
/// so the cursor can sit at capacity between ticks.
#[derive(Debug)]
pub struct Batch {
    records: Vec<Vec<u8>>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Batch {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, record: Vec<u8>) {
        debug_assert!(self.records.len() < self.capacity);
        self.records.push(record);
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The filled prefix only, never the allocated capacity.
    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }

    /// Empties the cursor while keeping the allocation for the next fill.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_to_capacity() {
        let mut batch = Batch::new(3);
        assert!(batch.is_empty());
        assert!(!batch.is_full());

        batch.append(b"one".to_vec());
        batch.append(b"two".to_vec());
        assert!(!batch.is_full());
        assert_eq!(batch.len(), 2);

        batch.append(b"three".to_vec());
        assert!(batch.is_full());
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_records_returns_filled_prefix_in_order() {
        let mut batch = Batch::new(10);
        batch.append(b"first".to_vec());
        batch.append(b"second".to_vec());

        let records = batch.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], b"first");
        assert_eq!(records[1], b"second");
    }

    #[test]
    fn test_clear_resets_cursor_but_keeps_capacity() {
        let mut batch = Batch::new(2);
        batch.append(b"a".to_vec());
        batch.append(b"b".to_vec());
        assert!(batch.is_full());

        batch.clear();
        assert!(batch.is_empty());
        assert!(!batch.is_full());
        assert_eq!(batch.capacity(), 2);

        batch.append(b"c".to_vec());
        assert_eq!(batch.records()[0], b"c");
    }
}
