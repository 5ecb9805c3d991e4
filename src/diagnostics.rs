//! Unified, `miette`-based diagnostics for the Arbor engine.
//!
//! # Overview
//!
//! Every error produced while defining or running an example tree is an [`ArborError`].
//! Definition-time problems (a `describe` with no target, a hook registered on the wrong
//! bucket) are returned synchronously from the definition call. Execution-time problems
//! raised inside hooks or example bodies are captured at the example boundary by the
//! engine and converted into a [`Failure`](crate::runtime::outcome::Failure).
//!
//! # Error Construction Macro
//!
//! - **Use `err_msg!` for message-only errors.**
//!   - `err_msg!(Execution, "expected {}, got {}", 1, 2)`
//!
//! - **Attach a location or help through [`ErrorContext`] only when you have one.**
//!   The definition API does this for you from the caller's `#[track_caller]` location.

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SOURCE LOCATIONS
// ============================================================================

/// A call-site location captured with `#[track_caller]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Returns the location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(std::panic::Location::caller())
    }
}

impl From<&'static std::panic::Location<'static>> for Location {
    fn from(loc: &'static std::panic::Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// ============================================================================
// ERROR CONTEXT
// ============================================================================

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Where the offending definition was written (if known).
    pub location: Option<Location>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Returns an empty error context (no location, no help).
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a context pointing at a definition site.
    pub fn at(location: Location) -> Self {
        Self {
            location: Some(location),
            help: None,
        }
    }

    /// Creates a context with a location and a help message.
    pub fn with_help(location: Location, help: impl Into<String>) -> Self {
        Self {
            location: Some(location),
            help: Some(help.into()),
        }
    }
}

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Type-safe error classification corresponding to [`ArborError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorType {
    /// Malformed group, example, or hook declarations.
    Definition,
    /// Failures raised by example bodies or let helpers.
    Execution,
    /// Failures raised by before/after/around hooks.
    Hook,
    /// Engine bugs.
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Definition => "Definition",
            ErrorType::Execution => "Execution",
            ErrorType::Hook => "Hook",
            ErrorType::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for all Arbor failure modes.
#[derive(Debug, Error)]
pub enum ArborError {
    #[error("Definition error: {message}")]
    Definition {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Execution failure: {message}")]
    Execution {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Hook failure: {message}")]
    Hook {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl ArborError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            ArborError::Definition { ctx, .. } => ctx,
            ArborError::Execution { ctx, .. } => ctx,
            ArborError::Hook { ctx, .. } => ctx,
            ArborError::Internal { ctx, .. } => ctx,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            ArborError::Definition { .. } => ErrorType::Definition,
            ArborError::Execution { .. } => ErrorType::Execution,
            ArborError::Hook { .. } => ErrorType::Hook,
            ArborError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// The bare message, without the variant prefix added by `Display`.
    pub fn message(&self) -> &str {
        match self {
            ArborError::Definition { message, .. }
            | ArborError::Execution { message, .. }
            | ArborError::Hook { message, .. }
            | ArborError::Internal { message, .. } => message,
        }
    }

    pub fn location(&self) -> Option<Location> {
        self.get_ctx().location
    }

    /// Builds a definition error anchored at `location`.
    pub(crate) fn definition(
        message: impl Into<String>,
        location: Location,
        help: Option<&str>,
    ) -> Self {
        ArborError::Definition {
            message: message.into(),
            ctx: ErrorContext {
                location: Some(location),
                help: help.map(str::to_string),
            },
            source: None,
        }
    }
}

impl Diagnostic for ArborError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::Definition => "arbor::definition",
            ErrorType::Execution => "arbor::execution",
            ErrorType::Hook => "arbor::hook",
            ErrorType::Internal => "arbor::internal",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let ctx = self.get_ctx();
        match (&ctx.help, ctx.location) {
            (Some(help), _) => Some(Box::new(help)),
            (None, Some(location)) => Some(Box::new(format!("defined at {location}"))),
            (None, None) => None,
        }
    }
}

/// Constructs an ArborError variant with a formatted message and no context.
///
/// ```rust
/// use arbor::{err_msg, ArborError};
/// let err: ArborError = err_msg!(Execution, "expected {}, got {}", 1, 2);
/// assert_eq!(err.to_string(), "Execution failure: expected 1, got 2");
/// ```
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::ArborError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::ArborError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}
