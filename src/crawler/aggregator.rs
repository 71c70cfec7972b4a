//! Collects parsed records from all workers into one dataset

use crate::plugin::{ParsedRecord, Row};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Rows extracted during a crawl, grouped by table or record kind
///
/// Within a key, rows keep the order in which pages finished parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    tables: BTreeMap<String, Vec<Row>>,
}

impl Dataset {
    pub fn get(&self, key: &str) -> Option<&[Row]> {
        self.tables.get(key).map(Vec::as_slice)
    }

    /// Number of distinct tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of rows across all tables
    pub fn total_records(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Iterates tables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.tables
            .iter()
            .map(|(key, rows)| (key.as_str(), rows.as_slice()))
    }
}

/// Merges records submitted by concurrent workers
#[derive(Debug, Default)]
pub struct Aggregator {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record's rows under its key
    ///
    /// # Returns
    ///
    /// Number of rows appended
    pub fn submit(&self, record: ParsedRecord) -> usize {
        let (key, rows) = record.into_rows();
        let count = rows.len();
        self.lock().entry(key).or_default().extend(rows);
        count
    }

    /// Appends all records of one page under a single lock
    ///
    /// Rows of one page stay contiguous within each key.
    pub fn submit_all(&self, records: Vec<ParsedRecord>) -> usize {
        let mut tables = self.lock();
        records
            .into_iter()
            .map(|record| {
                let (key, rows) = record.into_rows();
                let count = rows.len();
                tables.entry(key).or_default().extend(rows);
                count
            })
            .sum()
    }

    /// Total rows submitted so far
    pub fn submitted(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Copies the current contents
    pub fn snapshot(&self) -> Dataset {
        Dataset {
            tables: self.lock().clone(),
        }
    }

    pub fn into_dataset(self) -> Dataset {
        Dataset {
            tables: self
                .tables
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}
