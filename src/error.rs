//! # Error Handling
//!
//! Every failure in the buffer is local and synchronous: it is returned from the
//! call that caused it and is never retried internally. Eviction under capacity
//! pressure is steady-state behaviour and is not represented here.
//!
//! ## Taxonomy
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | `InvalidConfiguration` | construction with a zero capacity, bad size/seconds/bitrate |
//! | `Closed` | any stream operation after `close()` |
//! | `InvalidSeek` | a seek whose resulting offset would be negative |
//! | `AmbiguousQuery` | more than one extraction budget given to `copy_to` |
//! | `SinkRejected` | the external sink failed part way through a copy |
//! | `Timeout` | a split request the producer did not honour in time |
//! | `Unsupported` | an operation the target cannot perform (e.g. resizing a fixed view) |
//!
//! ## Usage
//!
//! ```rust
//! use frame_ring::error::{BufferError, Retryable};
//!
//! let error = BufferError::timeout("split", 15_000)
//!     .with_recovery_suggestion("request a key frame before splitting");
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "timeout");
//! ```

use std::{error::Error as StdError, fmt, io, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warnings that may indicate a caller-side issue
    Warning,
    /// Errors that affect the current call only
    Error,
    /// Errors that leave the instance unusable
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether the caller may retry the same call
    pub retryable: bool,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            retryable: false,
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operation that was being performed
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set severity level
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the circular buffer and its extraction engine
#[derive(Debug)]
pub enum BufferError {
    /// Bad construction parameters
    InvalidConfiguration {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Operation attempted on a closed stream
    Closed {
        operation: String,
        context: ErrorContext,
    },
    /// Seek would land before the start of the stream
    InvalidSeek {
        offset: i128,
        context: ErrorContext,
    },
    /// More than one of size/seconds/frames was requested
    AmbiguousQuery {
        given: Vec<&'static str>,
        context: ErrorContext,
    },
    /// The external sink refused a write during a copy
    SinkRejected {
        written: usize,
        source: io::Error,
        context: ErrorContext,
    },
    /// A blocking wait expired
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
    /// The target cannot perform the operation at all
    Unsupported {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
}

impl BufferError {
    /// Create a configuration error
    pub fn invalid_configuration(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a closed-stream error
    pub fn closed(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Closed {
            context: ErrorContext::new().with_operation(operation.clone()),
            operation,
        }
    }

    /// Create an invalid seek error for the offending resulting offset
    pub fn invalid_seek(offset: i128) -> Self {
        Self::InvalidSeek {
            offset,
            context: ErrorContext::new()
                .with_operation("seek")
                .with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create an ambiguous query error listing the budgets that were given
    pub fn ambiguous_query(given: Vec<&'static str>) -> Self {
        Self::AmbiguousQuery {
            given,
            context: ErrorContext::new()
                .with_operation("copy_to")
                .with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a sink rejection error
    pub fn sink_rejected(written: usize, source: io::Error) -> Self {
        let mut context = ErrorContext::new().with_operation("copy_to");
        context.retryable = true;
        Self::SinkRejected {
            written,
            source,
            context,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        let operation = operation.into();
        let mut context = ErrorContext::new().with_operation(operation.clone());
        context.retryable = true;
        Self::Timeout {
            operation,
            duration_ms,
            context,
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Unsupported {
            context: ErrorContext::new().with_operation(operation.clone()),
            operation,
            reason: reason.into(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::InvalidConfiguration { context, .. } => context,
            Self::Closed { context, .. } => context,
            Self::InvalidSeek { context, .. } => context,
            Self::AmbiguousQuery { context, .. } => context,
            Self::SinkRejected { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Unsupported { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::InvalidConfiguration { context, .. } => context,
            Self::Closed { context, .. } => context,
            Self::InvalidSeek { context, .. } => context,
            Self::AmbiguousQuery { context, .. } => context,
            Self::SinkRejected { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Unsupported { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "config",
            Self::Closed { .. } => "closed",
            Self::InvalidSeek { .. } => "seek",
            Self::AmbiguousQuery { .. } => "query",
            Self::SinkRejected { .. } => "sink",
            Self::Timeout { .. } => "timeout",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::InvalidConfiguration {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            BufferError::Closed { operation, .. } => {
                write!(f, "I/O operation '{}' on a closed stream", operation)
            }
            BufferError::InvalidSeek { offset, .. } => {
                write!(
                    f,
                    "New position {} is before the start of the stream",
                    offset
                )
            }
            BufferError::AmbiguousQuery { given, .. } => {
                write!(
                    f,
                    "Only one of size, seconds or frames may be given (got {})",
                    given.join(", ")
                )
            }
            BufferError::SinkRejected {
                written, source, ..
            } => {
                write!(
                    f,
                    "Sink rejected write after {} bytes: {}",
                    written, source
                )
            }
            BufferError::Timeout {
                operation,
                duration_ms,
                ..
            } => {
                write!(f, "Timed out during {} after {}ms", operation, duration_ms)
            }
            BufferError::Unsupported {
                operation, reason, ..
            } => {
                write!(f, "Cannot {}: {}", operation, reason)
            }
        }
    }
}

impl StdError for BufferError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::SinkRejected { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type BufferResult<T> = Result<T, BufferError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for BufferError {
    fn is_retryable(&self) -> bool {
        self.context().retryable
            || matches!(self, Self::Timeout { .. } | Self::SinkRejected { .. })
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Timeout { .. } => Some(1000),
            Self::SinkRejected { .. } => Some(100),
            _ => None,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for BufferError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for BufferError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Check if an error means the instance cannot be used any further
    pub fn is_fatal(error: &BufferError) -> bool {
        matches!(
            error,
            BufferError::InvalidConfiguration { .. } | BufferError::Closed { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Check if an error was caused by the caller's arguments alone
    pub fn is_caller_error(error: &BufferError) -> bool {
        matches!(
            error,
            BufferError::InvalidSeek { .. } | BufferError::AmbiguousQuery { .. }
        )
    }
}

/// Maps buffer errors onto `std::io` kinds so the streams can implement
/// `Read`/`Write`/`Seek`.
impl From<BufferError> for io::Error {
    fn from(error: BufferError) -> Self {
        let kind = match &error {
            BufferError::InvalidSeek { .. }
            | BufferError::AmbiguousQuery { .. }
            | BufferError::InvalidConfiguration { .. } => io::ErrorKind::InvalidInput,
            BufferError::Closed { .. } => io::ErrorKind::BrokenPipe,
            BufferError::SinkRejected { source, .. } => source.kind(),
            BufferError::Timeout { .. } => io::ErrorKind::TimedOut,
            BufferError::Unsupported { .. } => io::ErrorKind::Unsupported,
        };
        io::Error::new(kind, error)
    }
}
