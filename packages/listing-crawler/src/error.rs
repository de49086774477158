//! Typed errors for the crawler library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only fetch failures and configuration mistakes are errors. An extraction
//! miss yields zero records and an unrecognized date yields an unknown
//! [`DateParseResult`](crate::dates::DateParseResult); neither is raised.

use thiserror::Error;

/// Errors that can occur during a crawl run.
///
/// Fetch failures never abort a run (they are counted in the summary), so
/// this is only returned for problems that prevent the run from starting.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Configuration was rejected
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Writing the result set failed
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Whether a fetch failure may succeed if attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, HTTP 5xx, connection reset
    Transient,
    /// HTTP 4xx, unresolvable host, malformed URL
    Permanent,
}

impl FailureKind {
    /// Whether this failure kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Errors returned by a [`Fetcher`](crate::traits::fetcher::Fetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Retryable failure
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Non-retryable failure
    #[error("permanent failure fetching {url}: {reason}")]
    Permanent { url: String, reason: String },
}

impl FetchError {
    /// Create a transient error.
    pub fn transient(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a permanent error.
    pub fn permanent(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permanent {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transient { .. } => FailureKind::Transient,
            FetchError::Permanent { .. } => FailureKind::Permanent,
        }
    }

    /// Whether the error may clear up on retry.
    pub fn is_transient(&self) -> bool {
        self.kind().should_retry()
    }

    /// The URL that failed.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transient { url, .. } | FetchError::Permanent { url, .. } => url,
        }
    }

    /// Turn a transient error into a permanent one once retries are spent.
    pub fn escalate(self, attempts: u32) -> Self {
        match self {
            FetchError::Transient { url, reason } => FetchError::Permanent {
                url,
                reason: format!("{} (gave up after {} attempts)", reason, attempts),
            },
            permanent => permanent,
        }
    }
}

/// Errors raised while loading or validating crawl configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A CSS selector string could not be parsed
    #[error("invalid selector for {field}: {selector:?} ({reason})")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    /// A seed URL could not be parsed
    #[error("invalid seed URL: {url}")]
    InvalidSeed { url: String },

    /// A numeric setting is out of range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// No seeds configured
    #[error("at least one seed URL is required")]
    NoSeeds,

    /// Configuration file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for `CrawlConfig`
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The HTTP client could not be built from the fetch settings
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised by output sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Underlying writer failed
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization failed
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for crawl operations.
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for sink operations.
pub type SinkResult<T> = std::result::Result<T, SinkError>;
