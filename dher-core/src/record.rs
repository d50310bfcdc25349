//! Types for recording various values obtained while sampling.
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Represents possible types of values in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Represents a scalar, e.g., the number of synthetic transitions.
    Scalar(f32),

    /// Represents a string.
    String(String),
}

/// Represents a record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record with a scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Gets keys.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets the value for the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Gets a scalar value, `None` if the key is absent or not a scalar.
    pub fn get_scalar(&self, k: &str) -> Option<f32> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    /// Merges records.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Returns `true` if the record has no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Record {
    type Item = (String, RecordValue);
    type IntoIter = IntoIter<String, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Writes a record to an output destination.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);
}

/// A recorder that ignores any record.
#[derive(Debug, Default)]
pub struct NullRecorder {}

impl Recorder for NullRecorder {
    fn write(&mut self, _record: Record) {}
}

/// Buffered recorder.
///
/// Keeps every record in memory, mainly for tests and post-hoc inspection.
#[derive(Debug, Default)]
pub struct BufferedRecorder(Vec<Record>);

impl BufferedRecorder {
    /// Creates an empty buffered recorder.
    pub fn new() -> Self {
        Self(Vec::default())
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.0.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.0.push(record);
    }
}
