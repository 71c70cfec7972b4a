//! Page parser plugins
//!
//! A page parser knows how to read one kind of page: which links lead on from
//! it, which records it carries, and whether the content that arrived is
//! usable at all. The engine never looks at markup itself; it looks up the
//! parser registered for a page's type and calls it.
//!
//! # Components
//!
//! - `PageParser`: The plugin contract (navigate, parse, validate)
//! - `PageParsers`: Registry mapping page type ids to parsers
//! - `test_server`: Parsers for the listing/data layout of the toy server

mod registry;
pub mod test_server;

pub use registry::{PageParsers, ParserInfo};

use crate::PluginError;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Identifier of a page type, chosen by whoever registers the parser
pub type PageTypeId = u32;

/// One row of extracted data, ordered by field name
pub type Row = BTreeMap<String, String>;

/// A link discovered on a page, tagged with the type of the page it leads to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Absolute or relative href as found in the content
    pub url: String,
    pub type_id: PageTypeId,
}

impl Link {
    pub fn new(url: impl Into<String>, type_id: PageTypeId) -> Self {
        Self {
            url: url.into(),
            type_id,
        }
    }
}

/// Structured output of a page parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    /// A single key/value record, stored under its `kind`
    Flat { kind: String, fields: Row },

    /// Rows of a table found on the page, stored under the table name
    Table { table: String, rows: Vec<Row> },
}

impl ParsedRecord {
    /// Dataset key this record is aggregated under
    pub fn key(&self) -> &str {
        match self {
            Self::Flat { kind, .. } => kind,
            Self::Table { table, .. } => table,
        }
    }

    /// Number of dataset rows this record contributes
    pub fn row_count(&self) -> usize {
        match self {
            Self::Flat { .. } => 1,
            Self::Table { rows, .. } => rows.len(),
        }
    }

    /// Splits the record into its dataset key and rows
    pub fn into_rows(self) -> (String, Vec<Row>) {
        match self {
            Self::Flat { kind, fields } => (kind, vec![fields]),
            Self::Table { table, rows } => (table, rows),
        }
    }
}

/// Contract implemented by every page type plugin
///
/// All three operations receive the raw page content. Implementations must be
/// cheap to share between workers; the registry hands out `&dyn PageParser`.
pub trait PageParser: Send + Sync {
    /// Human readable parser name, used in logs and `--parsers` output
    fn name(&self) -> &str;

    /// Extracts links to follow from the page
    ///
    /// Hrefs may be relative; the engine resolves them against the page URL.
    fn navigate(&self, _content: &str) -> Result<Vec<Link>, PluginError> {
        Ok(Vec::new())
    }

    /// Extracts structured records from the page
    fn parse(&self, _content: &str) -> Result<Vec<ParsedRecord>, PluginError> {
        Ok(Vec::new())
    }

    /// Checks whether the content is complete enough to parse
    ///
    /// Returning `false` makes the engine fetch the page again, up to the
    /// configured retry budget. Parsers without a check accept everything.
    fn validate(&self, _content: &str) -> bool {
        true
    }

    fn supports_navigation(&self) -> bool {
        false
    }

    fn supports_parsing(&self) -> bool {
        false
    }

    fn supports_validation(&self) -> bool {
        false
    }
}

/// Runs a plugin operation, turning a panic into [`PluginError::Panicked`]
///
/// # Arguments
///
/// * `operation` - Name of the operation, used in the error
/// * `f` - The plugin call
pub fn guarded<T, F>(operation: &'static str, f: F) -> Result<T, PluginError>
where
    F: FnOnce() -> Result<T, PluginError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked {
            operation,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
