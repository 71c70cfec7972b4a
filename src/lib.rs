//! Crab: a pluggable page-type crawler
//!
//! This crate implements a crawling engine that walks a site, hands every fetched
//! page to the parser registered for its page type, and collects the structured
//! records those parsers extract. Pages whose content fails validation are
//! re-fetched a bounded number of times.

pub mod config;
pub mod crawler;
pub mod output;
pub mod plugin;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crab operations
#[derive(Debug, Error)]
pub enum CrabError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parser error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition for {url}: {from:?} -> {to:?}")]
    InvalidTransition {
        url: String,
        from: state::PageState,
        to: state::PageState,
    },

    #[error("Page is not tracked by the frontier: {url}")]
    UnknownPage { url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Errors raised while retrieving page content
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transient failures (connect, timeout, 5xx) kept failing until the attempt budget ran out
    #[error("Giving up on {url} after {attempts} attempt(s): {cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        cause: String,
    },

    /// The server answered with a client error; retrying the same request will not help
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The request cannot succeed as sent (redirect loop, invalid request)
    #[error("Request to {url} failed: {cause}")]
    Request { url: String, cause: String },
}

impl FetchError {
    /// Returns true if the failure came from transport problems that may clear up
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Page type registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No parser registered for page type {0}")]
    UnknownType(plugin::PageTypeId),

    #[error("Page type {0} is already registered")]
    DuplicateType(plugin::PageTypeId),
}

/// Faults raised by page parsers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} produced invalid output: {message}")]
    InvalidOutput {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} panicked: {message}")]
    Panicked {
        operation: &'static str,
        message: String,
    },
}

/// Result type alias for crab operations
pub type Result<T> = std::result::Result<T, CrabError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, run, Coordinator, CrawlReport};
pub use plugin::{Link, PageParser, PageParsers, PageTypeId, ParsedRecord};
pub use state::{PageRef, PageState};
pub use crate::url::{normalize_url, page_url, resolve_link};
