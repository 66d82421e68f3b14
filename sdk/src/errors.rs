//! Error types and handling
//!
//! This module provides the caller-facing error taxonomy of the variant
//! generator. All errors implement the `VariantErrorExt` trait which maps them
//! to an HTTP status, provides a user-friendly hint, and indicates whether a
//! directive-level retry can recover from them.
//!
//! # Security
//!
//! Error messages never include the provider API key or the gateway bearer
//! token. Upstream response bodies are carried only for caller-correctable
//! rejections, where the text explains what the caller has to change.

use thiserror::Error;

/// Trait for variant error extensions
pub trait VariantErrorExt {
    /// HTTP status code this error maps to at the gateway
    fn status_code(&self) -> u16;

    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors consume one attempt of a directive's retry budget
    /// instead of failing the whole request.
    fn is_recoverable(&self) -> bool;
}

/// Main error type for variant generation
///
/// # Error Categories
///
/// - **Caller**: bad request shape, failed authentication
/// - **Upstream**: timeouts, rate limiting, malformed output, rejections
/// - **Pipeline**: planning exhausted, directive retry budget exhausted
/// - **Configuration**: invalid startup configuration
///
/// # Examples
///
/// ```
/// use sdk::errors::{VariantError, VariantErrorExt};
///
/// let error = VariantError::Validation("`num` must be between 1 and 5".to_string());
/// assert_eq!(error.status_code(), 400);
///
/// let timeout = VariantError::UpstreamTimeout;
/// assert!(timeout.is_recoverable());
/// assert_eq!(timeout.status_code(), 500);
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariantError {
    // Caller errors
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized request")]
    Auth,

    // Upstream errors
    #[error("Upstream call timed out")]
    UpstreamTimeout,

    #[error("Upstream rate limit exceeded")]
    UpstreamRateLimited,

    #[error("Upstream returned malformed output: {0}")]
    UpstreamMalformedOutput(String),

    #[error("Upstream rejected the request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    // Pipeline errors
    #[error("Variation planning failed after {attempts} attempts: {reason}")]
    PlanningFailed { attempts: u32, reason: String },

    #[error(
        "Directive {directive_id} produced no valid question after {attempts} attempts: {}",
        violations.join("; ")
    )]
    DirectiveExhausted {
        directive_id: String,
        attempts: u32,
        violations: Vec<String>,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Upstream 4xx statuses passed through to the caller verbatim.
///
/// These describe conditions the caller can fix by changing the request,
/// such as a question too long for the model's context window.
const PASSTHROUGH_STATUSES: [u16; 3] = [400, 413, 422];

impl VariantErrorExt for VariantError {
    fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Auth => 401,
            Self::UpstreamRejected { status, .. } if PASSTHROUGH_STATUSES.contains(status) => {
                *status
            }
            _ => 500,
        }
    }

    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(_) => "Check the request body: `question` and `num` (1-5)",
            Self::Auth => "Provide a valid bearer token in the Authorization header",
            Self::UpstreamTimeout => "The language model took too long to respond. Try again",
            Self::UpstreamRateLimited => "The language model is rate limited. Wait and try again",
            Self::UpstreamMalformedOutput(_) => {
                "The language model returned unusable output. Try again"
            }
            Self::UpstreamRejected { .. } => "The language model rejected the request",
            Self::UpstreamUnavailable(_) => "The language model service is unavailable",
            Self::PlanningFailed { .. } => "Could not plan the requested variants. Try again",
            Self::DirectiveExhausted { .. } => {
                "Could not produce every requested variant. Try again or request fewer"
            }
            Self::Config(_) => "Check your config.toml file for errors",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout
                | Self::UpstreamRateLimited
                | Self::UpstreamMalformedOutput(_)
                | Self::UpstreamUnavailable(_)
        )
    }
}
