//! External collaborators of the loading pipeline.
//!
//! Loaders never talk to the network, the decoder or the filesystem
//! directly. They go through these traits, bundled into [`LoaderServices`].

use std::path::Path;
use std::sync::Arc;

use crate::container::{AsyncRequest, BoxedContainer};
use crate::loader::file::{BundleFileInfo, FileMeta, UpdateEntry};

/// A download started by a [`DownloadService`].
pub trait DownloadTask: Send {
    fn is_done(&self) -> bool;

    /// Only meaningful once [`DownloadTask::is_done`] holds.
    fn has_error(&self) -> bool;

    /// Forwards the failure to the download subsystem's own reporting.
    fn report_error(&self);
}

/// Fetches remote bundle files to their resolved disk path.
pub trait DownloadService: Send + Sync {
    /// Starts a download. Retries are the service's business; `max_retries`
    /// is passed through untouched.
    fn begin_download(&self, entry: &UpdateEntry, max_retries: u32) -> Box<dyn DownloadTask>;
}

/// Turns bundle files into containers.
pub trait BundleDecoder: Send + Sync {
    fn decode_blocking(&self, path: &Path, byte_offset: u64) -> Option<BoxedContainer>;

    fn decode_async(&self, path: &Path, byte_offset: u64) -> Box<dyn AsyncRequest<BoxedContainer>>;
}

/// Computes where the payload of an encrypted bundle starts.
pub trait DecryptionService: Send + Sync {
    fn decrypt_offset(&self, meta: &FileMeta) -> u64;
}

/// Existence checks on resolved disk paths.
pub trait FileLocator: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Checks the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileLocator;

impl FileLocator for DiskFileLocator {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Maps an asset path to the descriptor of the bundle that contains it.
pub trait BundleResolver: Send + Sync {
    fn resolve(&self, asset_path: &str) -> Option<BundleFileInfo>;
}

/// The collaborators a [`crate::BundleLoader`] drives.
#[derive(Clone)]
pub struct LoaderServices {
    pub download: Arc<dyn DownloadService>,
    pub decoder: Arc<dyn BundleDecoder>,
    pub decryption: Option<Arc<dyn DecryptionService>>,
    pub locator: Arc<dyn FileLocator>,
}

impl LoaderServices {
    /// Services without decryption, checking the real filesystem.
    pub fn new(download: Arc<dyn DownloadService>, decoder: Arc<dyn BundleDecoder>) -> Self {
        Self {
            download,
            decoder,
            decryption: None,
            locator: Arc::new(DiskFileLocator),
        }
    }

    #[must_use]
    pub fn with_decryption(mut self, decryption: Arc<dyn DecryptionService>) -> Self {
        self.decryption = Some(decryption);
        self
    }

    #[must_use]
    pub fn with_locator(mut self, locator: Arc<dyn FileLocator>) -> Self {
        self.locator = locator;
        self
    }
}

impl std::fmt::Debug for LoaderServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderServices")
            .field("decryption", &self.decryption.is_some())
            .finish_non_exhaustive()
    }
}
