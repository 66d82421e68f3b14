//! Variant Engine Library
//!
//! This library provides the core functionality of variantd: the generation
//! pipeline and the HTTP gateway in front of it. It is used by both the main
//! binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// LLM provider abstraction layer
pub mod llm;

/// Conductor orchestration module
pub mod conductor;

/// HTTP request gateway
pub mod gateway;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
