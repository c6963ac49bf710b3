//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`CandelaError`] covers all failure modes including:
//! - Asset file lookup and decoding errors
//! - GPU object creation failures
//! - Shader compile and program link failures
//!
//! # Usage
//!
//! Fallible internal APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, CandelaError>`. Load failures never cross the
//! asset-server boundary: they are logged and replaced by the type's default
//! payload, so `AssetServer::load` itself is infallible.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the Candela engine.
///
/// This enum covers all possible error conditions that can occur while
/// loading and finalizing assets. Each variant provides specific context
/// about what went wrong.
#[derive(Error, Debug)]
pub enum CandelaError {
    // ========================================================================
    // Asset Lookup & Decoding Errors
    // ========================================================================
    /// The backing file for an asset does not exist.
    #[error("File missing: {0}")]
    FileMissing(PathBuf),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),

    /// A text or binary asset file exists but cannot be parsed.
    #[error("Corrupt {kind} \"{name}\": {detail}")]
    CorruptAsset {
        /// Asset kind label (e.g. "model", "sound")
        kind: &'static str,
        /// Canonical asset name
        name: String,
        /// What the parser choked on
        detail: String,
    },

    // ========================================================================
    // GPU Errors
    // ========================================================================
    /// The device could not allocate a GPU object.
    #[error("GPU object creation failed: {0}")]
    GpuObjectCreate(String),

    /// A shader stage failed to compile.
    #[error("Shader stage ({stage}) failed to compile: {log}")]
    ShaderIncomplete {
        /// Stage label ("vertex", "fragment", "geometry")
        stage: &'static str,
        /// The driver's info log
        log: String,
    },

    /// A shader program failed to link. The program object may still exist
    /// with partial state; callers keep it and degrade rather than crash.
    #[error("Shader program \"{name}\" failed to link: {log}")]
    ProgramIncomplete {
        /// Canonical shader name
        name: String,
        /// The driver's info log
        log: String,
    },
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for CandelaError {
    fn from(err: image::ImageError) -> Self {
        CandelaError::ImageDecodeError(err.to_string())
    }
}

/// Alias for `Result<T, CandelaError>`.
pub type Result<T> = std::result::Result<T, CandelaError>;
