//! Fixed-capacity grouping of records into write batches

use crate::record::Record;

/// A group of records destined for one write call, never empty
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// Returns `None` for an empty vector; empty batches are never submitted
    pub fn new(records: Vec<Record>) -> Option<Self> {
        (!records.is_empty()).then_some(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Collects records and yields a [`Batch`] each time capacity is reached
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    pending: Vec<Record>,
}

impl BatchAccumulator {
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration validation rules that out.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "batch capacity must be positive");
        Self {
            capacity,
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Records waiting for the next batch
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Add a record, returning the completed batch when this one fills it
    pub fn offer(&mut self, record: Record) -> Option<Batch> {
        self.pending.push(record);
        if self.pending.len() < self.capacity {
            return None;
        }
        let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        Batch::new(full)
    }

    /// Take whatever is pending at end of stream
    pub fn flush(&mut self) -> Option<Batch> {
        Batch::new(std::mem::take(&mut self.pending))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;
    use std::collections::HashMap;

    fn record(i: usize) -> Record {
        Record::new(HashMap::from([(
            "pk".to_string(),
            AttributeValue::N(i.to_string()),
        )]))
    }

    fn drain(capacity: usize, n: usize) -> Vec<usize> {
        let mut acc = BatchAccumulator::new(capacity);
        let mut sizes: Vec<usize> = (0..n)
            .filter_map(|i| acc.offer(record(i)))
            .map(|b| b.len())
            .collect();
        sizes.extend(acc.flush().map(|b| b.len()));
        sizes
    }

    #[test]
    fn test_emits_full_batches_then_remainder() {
        assert_eq!(drain(25, 30), vec![25, 5]);
        assert_eq!(drain(25, 3), vec![3]);
        assert_eq!(drain(25, 50), vec![25, 25]);
        assert_eq!(drain(100, 0), Vec::<usize>::new());
    }

    #[test]
    fn test_batch_count_is_ceiling_of_input() {
        for capacity in [1, 7, 25, 100] {
            for n in 0..=(capacity * 3 + 1) {
                let sizes = drain(capacity, n);
                assert_eq!(sizes.len(), n.div_ceil(capacity), "capacity {} n {}", capacity, n);
                assert_eq!(sizes.iter().sum::<usize>(), n);
                if let Some((_, full)) = sizes.split_last() {
                    assert!(full.iter().all(|&s| s == capacity));
                }
            }
        }
    }

    #[test]
    fn test_flush_resets_and_preserves_order() {
        let mut acc = BatchAccumulator::new(4);
        assert!(acc.offer(record(1)).is_none());
        assert!(acc.offer(record(2)).is_none());
        assert_eq!(acc.pending(), 2);

        let batch = acc.flush().unwrap();
        assert_eq!(batch.records(), &[record(1), record(2)]);
        assert_eq!(acc.pending(), 0);
        assert!(acc.flush().is_none());
    }

    #[test]
    fn test_empty_batch_cannot_be_built() {
        assert!(Batch::new(Vec::new()).is_none());
    }

    #[test]
    #[should_panic(expected = "batch capacity must be positive")]
    fn test_zero_capacity_panics() {
        BatchAccumulator::new(0);
    }
}
