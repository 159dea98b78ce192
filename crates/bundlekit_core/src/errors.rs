//! Error Types
//!
//! This module defines the recoverable error type shared by every bundlekit
//! crate.
//!
//! # Overview
//!
//! [`BundleError`] covers the expected failure modes of the loading pipeline:
//! - Invalid or unresolvable bundle descriptors
//! - Download and decode failures
//! - Extraction failures (missing asset, wrong type)
//!
//! Loaders and providers never return these across their `update` boundary.
//! They are recorded as the `last_error` of the instance that failed and the
//! instance moves to its `Fail` status. Contract violations (destroying a
//! referenced loader, releasing a foreign handle) are not represented here;
//! they panic at the call site.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bundlekit_core::errors::{BundleError, Result};
//!
//! fn require_loaded(done: bool, path: &str) -> Result<()> {
//!     if done { Ok(()) } else { Err(BundleError::LoadIncomplete(path.to_string())) }
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The recoverable error type of the loading pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    // ========================================================================
    // Bundle Acquisition Errors
    // ========================================================================
    /// The bundle descriptor has no origin or disk path.
    #[error("Invalid bundle file descriptor: '{0}'")]
    InvalidFile(String),

    /// The bundle is not on disk and has no remote update entry to fetch it from.
    #[error("Bundle '{0}' is not available locally and has no update entry")]
    MissingUpdateEntry(String),

    /// The download subsystem reported an error.
    #[error("Failed to download bundle '{0}'")]
    DownloadFailed(String),

    /// The bundle file was expected on disk but is missing.
    #[error("Bundle file not found: {0}")]
    FileNotFound(PathBuf),

    /// The bundle is encrypted but no decryption service was configured.
    #[error("Bundle '{0}' is encrypted but no decryption service is configured")]
    MissingDecryption(String),

    /// The decode subsystem produced no container.
    #[error("Failed to decode bundle file '{0}'")]
    DecodeFailed(String),

    // ========================================================================
    // Resource Extraction Errors
    // ========================================================================
    /// No bundle contains the requested asset path.
    #[error("No bundle contains asset '{0}'")]
    NoOwningBundle(String),

    /// The owning bundle failed to load or was dropped.
    #[error("Bundle '{bundle}' required by asset '{asset_path}' is unavailable")]
    BundleUnavailable {
        /// The requested asset path
        asset_path: String,
        /// The origin path of the owning bundle
        bundle: String,
    },

    /// The container has no asset at the requested path.
    #[error("Asset not found: '{asset_path}' ({type_name})")]
    AssetNotFound {
        /// The requested asset path
        asset_path: String,
        /// The requested asset type
        type_name: &'static str,
    },

    /// The container returned an object of a different type than requested.
    #[error("Asset '{asset_path}' is not of the requested type {expected}")]
    TypeMismatch {
        /// The requested asset path
        asset_path: String,
        /// The requested asset type
        expected: &'static str,
    },

    // ========================================================================
    // Synchronous Access Errors
    // ========================================================================
    /// A synchronous load returned before the resource completed.
    #[error("Loading '{0}' could not be completed synchronously")]
    LoadIncomplete(String),
}

/// Alias for `Result<T, BundleError>`.
pub type Result<T> = std::result::Result<T, BundleError>;
