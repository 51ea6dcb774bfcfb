//! Core types and error definitions for Vilaw.
//!
//! This crate provides the foundational types shared across all Vilaw crates.
//!
//! # Main types
//!
//! - [`VilawError`] — Unified error enum for all Vilaw subsystems.
//! - [`VilawResult`] — Convenience alias for `Result<T, VilawError>`.

/// Top-level error type for Vilaw.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum VilawError {
    /// An error in configuration parsing or validation (empty credential
    /// pool, unknown model, malformed config file). Fatal, never retried.
    #[error("Config error: {0}")]
    Config(String),

    /// A failed call against the inference backend with one credential
    /// (transport, non-2xx status, malformed payload). Recovered inside the
    /// dispatcher by rotating to the next credential.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Every credential in the pool failed consecutively for the configured
    /// number of sweeps. Only surfaced when the dispatch policy bounds
    /// error sweeps; the default policy waits and retries instead.
    #[error("All credentials failing: {0}")]
    AllCredentialsFailing(String),

    /// A caller-supplied deadline elapsed while waiting for admission.
    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    /// An error from the retrieval or cache layer.
    #[error("Memory error: {0}")]
    Memory(String),

    /// An error from the content-safety checker.
    #[error("Safety error: {0}")]
    Safety(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`VilawError`].
pub type VilawResult<T> = Result<T, VilawError>;
