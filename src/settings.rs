//! Pipeline Settings
//!
//! ```rust,ignore
//! use bundlekit::{AssetSystemSettings, LoaderSettings};
//!
//! // Give up on synchronous completion sooner, and collect garbage every tick.
//! let settings = AssetSystemSettings {
//!     loader: LoaderSettings { wait_iteration_budget: 64, ..Default::default() },
//!     auto_unload_unused: true,
//! };
//! ```

use serde::{Deserialize, Serialize};

/// Per-loader configuration. Copied into every loader at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Passed through to the download service.
    pub max_download_retries: u32,

    /// Maximum number of `update` calls a synchronous wait performs before
    /// giving up. Remote bundles that are still downloading will usually
    /// exhaust it.
    pub wait_iteration_budget: u32,

    /// Check that the bundle file is on disk before handing it to the decoder.
    pub verify_file_before_decode: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_download_retries: u32::MAX,
            wait_iteration_budget: 1000,
            verify_file_before_decode: false,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSystemSettings {
    pub loader: LoaderSettings,

    /// Run `unload_unused_assets` at the end of every `update`.
    pub auto_unload_unused: bool,
}
