//! Bundle Loader
//!
//! Owns the lifecycle of one bundle file: fetch it if it is not on disk,
//! decode it, hold the decoded container and track the providers that read
//! from it.
//!
//! # State machine
//!
//! ```text
//! None ─┬─> LoadFile ─> CheckFile ─┬─> Success
//!       └─> Download ─> CheckDownload ─┘  └─> Fail
//! ```
//!
//! Every non-terminal state may also move to `Fail`. A single
//! [`BundleLoader::update`] advances through as many states as the available
//! data allows; it returns early only while a download or an asynchronous
//! decode is still pending.
//!
//! # Lifetime
//!
//! Each dependent provider holds exactly one reference. The registry
//! destroys a loader once it is done and unreferenced, and the container is
//! released exactly once at that point.

pub mod file;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bundlekit_core::{BundleError, OnceFlag, RefCounter, Status, StatusCell};
use parking_lot::Mutex;
use serde::Serialize;

use crate::container::{AsyncRequest, BoxedContainer, BundleContainer};
use crate::io::{DownloadTask, LoaderServices};
use crate::provider::ResourceProvider;
use crate::settings::LoaderSettings;

use self::file::BundleFileInfo;

/// Loading status of a bundle. Declaration order is the forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum LoaderStatus {
    None = 0,
    Download,
    CheckDownload,
    LoadFile,
    CheckFile,
    Success,
    Fail,
}

impl Status for LoaderStatus {
    fn code(self) -> u8 {
        self as u8
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Download,
            2 => Self::CheckDownload,
            3 => Self::LoadFile,
            4 => Self::CheckFile,
            5 => Self::Success,
            _ => Self::Fail,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::Download => "DOWNLOAD",
            Self::CheckDownload => "CHECK_DOWNLOAD",
            Self::LoadFile => "LOAD_FILE",
            Self::CheckFile => "CHECK_FILE",
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct LoaderState {
    providers: Vec<Arc<ResourceProvider>>,
    downloader: Option<Box<dyn DownloadTask>>,
    decode_request: Option<Box<dyn AsyncRequest<BoxedContainer>>>,
    container: Option<BoxedContainer>,
    last_error: Option<BundleError>,
}

pub struct BundleLoader {
    file: BundleFileInfo,
    services: LoaderServices,
    settings: LoaderSettings,

    status: StatusCell<LoaderStatus>,
    refs: RefCounter,
    destroyed: AtomicBool,
    /// Sticky: once set, every remaining decode runs blocking.
    wait_for_complete: AtomicBool,
    release_warning: OnceFlag,
    wait_warning: OnceFlag,

    state: Mutex<LoaderState>,
}

impl BundleLoader {
    pub fn new(file: BundleFileInfo, services: LoaderServices, settings: LoaderSettings) -> Self {
        Self {
            file,
            services,
            settings,
            status: StatusCell::new(LoaderStatus::None),
            refs: RefCounter::new(),
            destroyed: AtomicBool::new(false),
            wait_for_complete: AtomicBool::new(false),
            release_warning: OnceFlag::new(),
            wait_warning: OnceFlag::new(),
            state: Mutex::new(LoaderState::default()),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn file(&self) -> &BundleFileInfo {
        &self.file
    }

    #[inline]
    pub fn status(&self) -> LoaderStatus {
        self.status.get()
    }

    #[inline]
    pub fn ref_count(&self) -> i32 {
        self.refs.count()
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Done means Success or Fail.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn provider_count(&self) -> usize {
        self.state.lock().providers.len()
    }

    pub fn last_error(&self) -> Option<BundleError> {
        self.state.lock().last_error.clone()
    }

    pub fn has_container(&self) -> bool {
        self.state.lock().container.is_some()
    }

    /// Runs `f` against the decoded container, if there is one.
    ///
    /// The loader's state lock is held while `f` runs; `f` must not call back
    /// into this loader.
    pub fn with_container<R>(&self, f: impl FnOnce(&dyn BundleContainer) -> R) -> Option<R> {
        let state = self.state.lock();
        state.container.as_deref().map(|container| f(container))
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    /// Registers a dependent provider. Adding the same provider twice is a no-op.
    pub fn add_provider(&self, provider: &Arc<ResourceProvider>) {
        let mut state = self.state.lock();
        if !state.providers.iter().any(|p| Arc::ptr_eq(p, provider)) {
            state.providers.push(Arc::clone(provider));
        }
    }

    pub fn reference(&self) {
        self.refs.add();
    }

    /// Drops one reference. The count may go negative; that is logged once
    /// and the loader stays destroyable.
    pub fn release(&self) {
        if self.refs.release() < 0 && self.release_warning.trip() {
            log::warn!(
                "Bundle loader '{}' released more often than referenced. There may be resource leaks!",
                self.file.origin_path()
            );
        }
    }

    // ========================================================================
    // State machine
    // ========================================================================

    pub fn update(&self) {
        if self.is_done() || self.is_destroyed() {
            return;
        }
        let mut state = self.state.lock();
        self.step(&mut state);
    }

    fn step(&self, state: &mut LoaderState) {
        if self.status() == LoaderStatus::None {
            if !self.file.is_valid_file() {
                self.fail(state, BundleError::InvalidFile(self.file.origin_path().to_string()));
                return;
            }

            if self.file.is_local_file_exist(self.services.locator.as_ref()) {
                self.status.advance(LoaderStatus::LoadFile);
            } else {
                self.status.advance(LoaderStatus::Download);
            }
        }

        // 1. Start fetching from the remote source
        if self.status() == LoaderStatus::Download {
            let Some(entry) = self.file.update_entry() else {
                self.fail(
                    state,
                    BundleError::MissingUpdateEntry(self.file.origin_path().to_string()),
                );
                return;
            };

            log::debug!("Downloading bundle '{}' from {}", self.file.origin_path(), entry.url);
            state.downloader = Some(
                self.services
                    .download
                    .begin_download(entry, self.settings.max_download_retries),
            );
            self.status.advance(LoaderStatus::CheckDownload);
        }

        // 2. Poll the download
        if self.status() == LoaderStatus::CheckDownload {
            if let Some(downloader) = state.downloader.as_deref() {
                if !downloader.is_done() {
                    return;
                }
                if downloader.has_error() {
                    downloader.report_error();
                    state.downloader = None;
                    self.fail(state, BundleError::DownloadFailed(self.file.origin_path().to_string()));
                    return;
                }
            }
            state.downloader = None;
            self.status.advance(LoaderStatus::LoadFile);
        }

        // 3. Start decoding
        if self.status() == LoaderStatus::LoadFile {
            let path = self.file.disk_path();

            if self.settings.verify_file_before_decode && !self.services.locator.exists(path) {
                log::warn!("Bundle file not found on disk: {}", path.display());
                self.fail(state, BundleError::FileNotFound(path.to_path_buf()));
                return;
            }

            let byte_offset = if self.file.is_encrypted() {
                let Some(decryption) = self.services.decryption.as_ref() else {
                    self.fail(
                        state,
                        BundleError::MissingDecryption(self.file.origin_path().to_string()),
                    );
                    return;
                };
                decryption.decrypt_offset(self.file.meta())
            } else {
                0
            };

            if self.is_waiting_for_complete() {
                state.container = self.services.decoder.decode_blocking(path, byte_offset);
            } else {
                state.decode_request = Some(self.services.decoder.decode_async(path, byte_offset));
            }
            self.status.advance(LoaderStatus::CheckFile);
        }

        // 4. Collect the decode result
        if self.status() == LoaderStatus::CheckFile {
            if let Some(request) = state.decode_request.as_mut() {
                if self.is_waiting_for_complete() {
                    log::warn!(
                        "Suspending the calling thread to decode bundle '{}'",
                        self.file.origin_path()
                    );
                    request.wait();
                } else if !request.is_done() {
                    return;
                }
                state.container = request.take_result();
                state.decode_request = None;
            }

            if state.container.is_none() {
                self.fail(state, BundleError::DecodeFailed(self.file.origin_path().to_string()));
            } else {
                log::debug!("Bundle '{}' loaded", self.file.origin_path());
                self.status.advance(LoaderStatus::Success);
            }
        }
    }

    fn fail(&self, state: &mut LoaderState, error: BundleError) {
        log::error!("{error}");
        state.last_error = Some(error);
        self.status.advance(LoaderStatus::Fail);
    }

    #[inline]
    fn is_waiting_for_complete(&self) -> bool {
        self.wait_for_complete.load(Ordering::Acquire)
    }

    /// Forces the loader towards completion on the calling thread.
    ///
    /// Every remaining decode runs blocking from now on. Downloads cannot be
    /// forced; the loader keeps polling them until the iteration budget is
    /// spent, logs once and returns. Callers must re-check [`Self::is_done`].
    pub fn wait_for_async_complete(&self) {
        self.wait_for_complete.store(true, Ordering::Release);

        let mut budget = self.settings.wait_iteration_budget;
        while !self.is_done() {
            if budget == 0 {
                if self.wait_warning.trip() {
                    log::warn!(
                        "wait_for_async_complete gave up on bundle '{}' in status {}",
                        self.file.origin_path(),
                        self.status()
                    );
                }
                break;
            }
            budget -= 1;
            self.update();
        }
    }

    // ========================================================================
    // Destruction
    // ========================================================================

    /// Done and no outstanding reference.
    pub fn can_destroy(&self) -> bool {
        self.is_done() && self.refs.is_unreferenced()
    }

    /// Destroys every dependent provider, if all of them can go.
    ///
    /// Does nothing unless the loader is done, every provider is destroyable
    /// and no reference exists beyond the tracked providers. On success the
    /// detached providers are returned so the caller can deregister them;
    /// otherwise the returned list is empty.
    pub fn try_destroy_all_providers(&self) -> Vec<Arc<ResourceProvider>> {
        if !self.is_done() {
            return Vec::new();
        }

        let mut state = self.state.lock();
        if state.providers.iter().any(|provider| !provider.can_destroy()) {
            return Vec::new();
        }

        let tracked = i32::try_from(state.providers.len()).unwrap_or(i32::MAX);
        if self.ref_count() > tracked {
            return Vec::new();
        }

        for provider in &state.providers {
            provider.destroy();
        }
        std::mem::take(&mut state.providers)
    }

    /// Marks the loader destroyed and releases the container.
    ///
    /// With `force_destroy` the reference and completion checks are skipped
    /// and dependent providers are left as they are. This is the emergency
    /// teardown path used when everything is being unloaded at once.
    ///
    /// # Panics
    /// Without `force_destroy`, if the loader is still referenced or not done.
    pub fn destroy(&self, force_destroy: bool) {
        self.destroyed.store(true, Ordering::Release);

        if !force_destroy {
            assert!(
                self.ref_count() <= 0,
                "Bundle loader ref count is not zero: {}",
                self.file.origin_path()
            );
            assert!(self.is_done(), "Bundle loader is not done: {}", self.file.origin_path());
        }

        let mut state = self.state.lock();
        state.downloader = None;
        state.decode_request = None;
        if let Some(container) = state.container.take() {
            container.unload();
        }
    }
}

impl fmt::Debug for BundleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleLoader")
            .field("origin_path", &self.file.origin_path())
            .field("status", &self.status())
            .field("ref_count", &self.ref_count())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}
