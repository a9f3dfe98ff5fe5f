//! Shared helpers for integration tests
//!
//! [`FakeStore`] is an in-memory `ItemStore` that records every call and can be
//! scripted to reject specific items a number of times, to fail a given call
//! outright, or to reject transactions.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use dynaload_ingest::store::{BatchPutOutcome, ItemStore};
use dynaload_ingest::{Record, StoreError};
use flate2::{write::GzEncoder, Compression};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    BatchPut(usize),
    Continue(usize),
    Transact(usize),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    committed: Vec<Record>,
    /// pk -> remaining rejections
    rejections: HashMap<String, u32>,
    fail_batch_call: Option<usize>,
    fail_transaction_call: Option<usize>,
    batch_calls: usize,
    transaction_calls: usize,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the item with `pk` as unprocessed `times` times before accepting it
    pub fn reject_times(self, pk: &str, times: u32) -> Self {
        self.state.lock().unwrap().rejections.insert(pk.to_string(), times);
        self
    }

    /// The `n`th batch-put or continuation call (1-based) fails outright
    pub fn fail_batch_call(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_batch_call = Some(n);
        self
    }

    /// The `n`th transaction (1-based) is rejected as a whole
    pub fn fail_transaction_call(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_transaction_call = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn committed(&self) -> Vec<Record> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn committed_count(&self) -> usize {
        self.state.lock().unwrap().committed.len()
    }

    fn put(&self, items: Vec<Record>, call: Call) -> Result<BatchPutOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.batch_calls += 1;
        if state.fail_batch_call == Some(state.batch_calls) {
            return Err(StoreError::service("BatchWriteItem", "connection reset by peer"));
        }

        let mut outcome = BatchPutOutcome::default();
        for record in items {
            let key = pk(&record);
            match state.rejections.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    outcome.unprocessed.push(record);
                },
                _ => {
                    outcome.accepted += 1;
                    state.committed.push(record);
                },
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl ItemStore for FakeStore {
    async fn batch_put(&self, _table: &str, items: Vec<Record>) -> Result<BatchPutOutcome, StoreError> {
        let call = Call::BatchPut(items.len());
        self.put(items, call)
    }

    async fn batch_put_continue(
        &self,
        _table: &str,
        unprocessed: Vec<Record>,
    ) -> Result<BatchPutOutcome, StoreError> {
        let call = Call::Continue(unprocessed.len());
        self.put(unprocessed, call)
    }

    async fn transact_write(&self, _table: &str, items: Vec<Record>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Transact(items.len()));
        state.transaction_calls += 1;
        if state.fail_transaction_call == Some(state.transaction_calls) {
            return Err(StoreError::TransactionRejected {
                items: items.len(),
                message: "TransactionCanceledException: ConditionalCheckFailed".to_string(),
            });
        }
        state.committed.extend(items);
        Ok(())
    }
}

pub fn pk(record: &Record) -> String {
    match record.item().get("pk") {
        Some(AttributeValue::S(pk)) => pk.clone(),
        other => panic!("record without string pk: {:?}", other),
    }
}

pub fn record(pk: &str) -> Record {
    Record::new(HashMap::from([
        ("pk".to_string(), AttributeValue::S(pk.to_string())),
        ("n".to_string(), AttributeValue::N("1".to_string())),
    ]))
}

pub fn records(prefix: &str, n: usize) -> Vec<Record> {
    (0..n).map(|i| record(&format!("{}-{}", prefix, i))).collect()
}

pub fn export_line(pk: &str) -> String {
    format!(r#"{{"Item":{{"pk":{{"S":"{}"}},"n":{{"N":"1"}}}}}}"#, pk)
}

/// Write a gzip export named `name` with one line per entry of `lines`
pub fn write_export(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
    for line in lines {
        writeln!(encoder, "{}", line).unwrap();
    }
    encoder.finish().unwrap();
    path
}

/// Export of `n` well-formed items keyed `prefix-0..n`
pub fn write_items(dir: &Path, name: &str, prefix: &str, n: usize) -> PathBuf {
    let lines: Vec<_> = (0..n).map(|i| export_line(&format!("{}-{}", prefix, i))).collect();
    write_export(dir, name, &lines)
}
