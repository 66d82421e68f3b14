//! Variant SDK
//!
//! Shared library providing the data model and error taxonomy for the
//! variant question generator. This crate is used by the engine and by any
//! caller that embeds the gateway as an in-process function.

/// Error types and handling
pub mod errors;

/// Request, candidate, and result types
pub mod types;

// Re-export commonly used types
pub use errors::{VariantError, VariantErrorExt};
pub use types::{
    FocusAxis, KnowledgePoint, OptionLetter, UsageRecord, ValidationOutcome, VariantCandidate,
    VariantQuestion, VariantRequest, VariantResult, VariationDirective, DEFAULT_VARIANT_COUNT,
    MAX_VARIANT_COUNT, MIN_VARIANT_COUNT,
};
