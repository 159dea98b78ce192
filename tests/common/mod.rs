//! Scripted collaborators shared by the integration tests.
//!
//! Every mock records what the pipeline asked of it, so tests can assert on
//! decode offsets, blocking calls, download requests and container unloads.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use bundlekit::{
    AssetObject, AssetType, AsyncRequest, BoxedContainer, BundleContainer, BundleDecoder,
    BundleFileInfo, BundleResolver, DecryptionService, DownloadService, DownloadTask, FileLocator,
    FileMeta, LoaderServices, SceneObject, UpdateEntry,
};
use parking_lot::Mutex;

// ============================================================================
// Requests
// ============================================================================

/// Completes after a fixed number of `is_done` polls, or at once on `wait`.
pub struct PollRequest<T> {
    remaining: AtomicU32,
    total: u32,
    result: Option<T>,
    waits: Arc<AtomicUsize>,
}

impl<T> PollRequest<T> {
    pub fn new(polls: u32, result: Option<T>, waits: Arc<AtomicUsize>) -> Self {
        Self {
            remaining: AtomicU32::new(polls),
            total: polls,
            result,
            waits,
        }
    }
}

impl<T: Send> AsyncRequest<T> for PollRequest<T> {
    fn is_done(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_err()
    }

    fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        let remaining = self.remaining.load(Ordering::Acquire);
        1.0 - remaining as f32 / self.total as f32
    }

    fn wait(&mut self) {
        self.waits.fetch_add(1, Ordering::AcqRel);
        self.remaining.store(0, Ordering::Release);
    }

    fn take_result(&mut self) -> Option<T> {
        self.result.take()
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Objects stored in one mock bundle, by name.
#[derive(Clone, Default)]
pub struct BundleContents {
    pub objects: HashMap<String, Vec<AssetObject>>,
    pub scenes: HashSet<String>,
}

impl BundleContents {
    #[must_use]
    pub fn with(mut self, name: &str, object: AssetObject) -> Self {
        self.objects.entry(name.to_string()).or_default().push(object);
        self
    }

    #[must_use]
    pub fn with_scene(mut self, name: &str) -> Self {
        self.scenes.insert(name.to_string());
        self
    }
}

pub struct MockContainer {
    contents: BundleContents,
    extract_polls: u32,
    waits: Arc<AtomicUsize>,
    unloads: Arc<AtomicUsize>,
}

impl BundleContainer for MockContainer {
    // Hands back the first object under `name` whatever its type; the
    // provider is responsible for checking it.
    fn load_asset(&self, name: &str, _asset_type: &AssetType) -> Option<AssetObject> {
        self.contents.objects.get(name)?.first().cloned()
    }

    fn load_asset_async(
        &self,
        name: &str,
        asset_type: &AssetType,
    ) -> Box<dyn AsyncRequest<AssetObject>> {
        Box::new(PollRequest::new(
            self.extract_polls,
            self.load_asset(name, asset_type),
            Arc::clone(&self.waits),
        ))
    }

    fn load_sub_assets(&self, name: &str, _asset_type: &AssetType) -> Vec<AssetObject> {
        self.contents.objects.get(name).cloned().unwrap_or_default()
    }

    fn load_scene(&self, name: &str) -> Option<SceneObject> {
        self.contents
            .scenes
            .contains(name)
            .then(|| SceneObject::new(name, Arc::new(name.to_string())))
    }

    fn unload(self: Box<Self>) {
        self.unloads.fetch_add(1, Ordering::AcqRel);
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decodes the bundles registered with [`MockDecoder::insert`]; any other
/// path decodes to nothing.
#[derive(Default)]
pub struct MockDecoder {
    bundles: Mutex<HashMap<PathBuf, BundleContents>>,
    /// `is_done` polls before an async decode completes.
    pub decode_polls: AtomicU32,
    /// `is_done` polls before an async extraction completes.
    pub extract_polls: AtomicU32,

    pub offsets: Mutex<Vec<u64>>,
    pub blocking_calls: AtomicUsize,
    pub async_calls: AtomicUsize,
    /// `wait` calls on decode and extraction requests.
    pub waits: Arc<AtomicUsize>,
    pub unloads: Arc<AtomicUsize>,
}

impl MockDecoder {
    pub fn insert(&self, path: impl Into<PathBuf>, contents: BundleContents) {
        self.bundles.lock().insert(path.into(), contents);
    }

    pub fn set_decode_polls(&self, polls: u32) {
        self.decode_polls.store(polls, Ordering::Release);
    }

    pub fn set_extract_polls(&self, polls: u32) {
        self.extract_polls.store(polls, Ordering::Release);
    }

    pub fn unload_count(&self) -> usize {
        self.unloads.load(Ordering::Acquire)
    }

    pub fn blocking_count(&self) -> usize {
        self.blocking_calls.load(Ordering::Acquire)
    }

    pub fn async_count(&self) -> usize {
        self.async_calls.load(Ordering::Acquire)
    }

    pub fn wait_count(&self) -> usize {
        self.waits.load(Ordering::Acquire)
    }

    fn decode(&self, path: &Path, byte_offset: u64) -> Option<BoxedContainer> {
        self.offsets.lock().push(byte_offset);
        let contents = self.bundles.lock().get(path).cloned()?;
        Some(Box::new(MockContainer {
            contents,
            extract_polls: self.extract_polls.load(Ordering::Acquire),
            waits: Arc::clone(&self.waits),
            unloads: Arc::clone(&self.unloads),
        }))
    }
}

impl BundleDecoder for MockDecoder {
    fn decode_blocking(&self, path: &Path, byte_offset: u64) -> Option<BoxedContainer> {
        self.blocking_calls.fetch_add(1, Ordering::AcqRel);
        self.decode(path, byte_offset)
    }

    fn decode_async(&self, path: &Path, byte_offset: u64) -> Box<dyn AsyncRequest<BoxedContainer>> {
        self.async_calls.fetch_add(1, Ordering::AcqRel);
        Box::new(PollRequest::new(
            self.decode_polls.load(Ordering::Acquire),
            self.decode(path, byte_offset),
            Arc::clone(&self.waits),
        ))
    }
}

// ============================================================================
// Download
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBehavior {
    /// Completes after this many polls.
    Succeed(u32),
    Fail,
    /// Never completes.
    Hang,
}

pub struct MockDownloader {
    behavior: Mutex<DownloadBehavior>,
    pub requests: Mutex<Vec<(String, u32)>>,
    pub reported_errors: Arc<AtomicUsize>,
}

impl Default for MockDownloader {
    fn default() -> Self {
        Self {
            behavior: Mutex::new(DownloadBehavior::Succeed(0)),
            requests: Mutex::new(Vec::new()),
            reported_errors: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockDownloader {
    pub fn set_behavior(&self, behavior: DownloadBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

struct MockDownloadTask {
    behavior: DownloadBehavior,
    remaining: AtomicU32,
    reported_errors: Arc<AtomicUsize>,
}

impl DownloadTask for MockDownloadTask {
    fn is_done(&self) -> bool {
        match self.behavior {
            DownloadBehavior::Hang => false,
            DownloadBehavior::Fail => true,
            DownloadBehavior::Succeed(_) => self
                .remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_err(),
        }
    }

    fn has_error(&self) -> bool {
        self.behavior == DownloadBehavior::Fail
    }

    fn report_error(&self) {
        self.reported_errors.fetch_add(1, Ordering::AcqRel);
    }
}

impl DownloadService for MockDownloader {
    fn begin_download(&self, entry: &UpdateEntry, max_retries: u32) -> Box<dyn DownloadTask> {
        self.requests.lock().push((entry.url.clone(), max_retries));
        let behavior = *self.behavior.lock();
        let polls = match behavior {
            DownloadBehavior::Succeed(polls) => polls,
            _ => 0,
        };
        Box::new(MockDownloadTask {
            behavior,
            remaining: AtomicU32::new(polls),
            reported_errors: Arc::clone(&self.reported_errors),
        })
    }
}

// ============================================================================
// Filesystem, decryption, resolution
// ============================================================================

#[derive(Default)]
pub struct MockLocator {
    present: Mutex<HashSet<PathBuf>>,
}

impl MockLocator {
    pub fn insert(&self, path: impl Into<PathBuf>) {
        self.present.lock().insert(path.into());
    }
}

impl FileLocator for MockLocator {
    fn exists(&self, path: &Path) -> bool {
        self.present.lock().contains(path)
    }
}

pub struct MockDecryption {
    pub offset: u64,
    pub seen: Mutex<Vec<String>>,
}

impl MockDecryption {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl DecryptionService for MockDecryption {
    fn decrypt_offset(&self, meta: &FileMeta) -> u64 {
        self.seen.lock().push(meta.name.clone());
        self.offset
    }
}

#[derive(Default)]
pub struct MockResolver {
    routes: Mutex<HashMap<String, BundleFileInfo>>,
}

impl MockResolver {
    pub fn route(&self, asset_path: &str, file: &BundleFileInfo) {
        self.routes.lock().insert(asset_path.to_string(), file.clone());
    }
}

impl BundleResolver for MockResolver {
    fn resolve(&self, asset_path: &str) -> Option<BundleFileInfo> {
        self.routes.lock().get(asset_path).cloned()
    }
}

// ============================================================================
// Fixture
// ============================================================================

#[derive(Default)]
pub struct Fixture {
    pub decoder: Arc<MockDecoder>,
    pub downloader: Arc<MockDownloader>,
    pub locator: Arc<MockLocator>,
    pub resolver: Arc<MockResolver>,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    pub fn services(&self) -> LoaderServices {
        LoaderServices::new(
            Arc::clone(&self.downloader) as Arc<dyn DownloadService>,
            Arc::clone(&self.decoder) as Arc<dyn BundleDecoder>,
        )
        .with_locator(Arc::clone(&self.locator) as Arc<dyn FileLocator>)
    }

    /// A bundle that is already on disk and decodes to `contents`.
    pub fn local_bundle(&self, name: &str, contents: BundleContents) -> BundleFileInfo {
        let file = bundle_info(name);
        self.locator.insert(file.disk_path());
        self.decoder.insert(file.disk_path(), contents);
        file
    }

    /// A bundle that has to be downloaded first and then decodes to `contents`.
    pub fn remote_bundle(&self, name: &str, contents: BundleContents) -> BundleFileInfo {
        let file = bundle_info(name).with_update_entry(UpdateEntry {
            file_name: name.to_string(),
            url: format!("https://cdn.example.test/{name}"),
            hash: format!("{name}-hash"),
            size: 1024,
        });
        self.decoder.insert(file.disk_path(), contents);
        file
    }
}

pub fn bundle_info(name: &str) -> BundleFileInfo {
    BundleFileInfo::new(
        name,
        format!("/sandbox/bundles/{name}"),
        FileMeta {
            name: name.to_string(),
            hash: format!("{name}-hash"),
            size: 1024,
        },
    )
}

pub fn object<T: std::any::Any + Send + Sync>(value: T) -> AssetObject {
    Arc::new(value)
}
