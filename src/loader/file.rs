//! Bundle file descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::FileLocator;

/// Metadata token of a bundle file. Opaque to the loader; handed to the
/// decryption service to compute the payload offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

/// Where and how to fetch a bundle that is not on disk yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub file_name: String,
    pub url: String,
    pub hash: String,
    pub size: u64,
}

/// Identity of a bundle loader. Two loaders for equal descriptors are the
/// same loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleFileInfo {
    origin_path: String,
    disk_path: PathBuf,
    encrypted: bool,
    meta: FileMeta,
    update_entry: Option<UpdateEntry>,
}

impl BundleFileInfo {
    pub fn new(origin_path: impl Into<String>, disk_path: impl Into<PathBuf>, meta: FileMeta) -> Self {
        Self {
            origin_path: origin_path.into(),
            disk_path: disk_path.into(),
            encrypted: false,
            meta,
            update_entry: None,
        }
    }

    #[must_use]
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    #[must_use]
    pub fn with_update_entry(mut self, entry: UpdateEntry) -> Self {
        self.update_entry = Some(entry);
        self
    }

    /// The bundle's path relative to the package root.
    #[inline]
    pub fn origin_path(&self) -> &str {
        &self.origin_path
    }

    #[inline]
    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    #[inline]
    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    #[inline]
    pub fn update_entry(&self) -> Option<&UpdateEntry> {
        self.update_entry.as_ref()
    }

    pub fn is_valid_file(&self) -> bool {
        !self.origin_path.is_empty() && !self.disk_path.as_os_str().is_empty()
    }

    pub fn is_local_file_exist(&self, locator: &dyn FileLocator) -> bool {
        locator.exists(&self.disk_path)
    }
}
