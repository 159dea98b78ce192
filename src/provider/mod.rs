//! Resource Provider
//!
//! A provider serves one `(asset path, type, kind)` request. It waits for its
//! owning [`BundleLoader`], extracts the payload from the decoded container
//! and hands it out through [`OperationHandle`]s.
//!
//! ```text
//! None ─> CheckBundle ─> Loading ─> Checking ─┬─> Success
//!                                             └─> Fail
//! ```
//!
//! The provider counts its live handles. It can be destroyed once it is done
//! and the last handle is gone; destroying it releases its reference on the
//! owning loader.
//!
//! Lock order is provider → loader. Everything the loader needs from a
//! provider (`can_destroy`, `destroy`) works on atomics only.

pub mod kind;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bundlekit_core::{BundleError, CompletionSignal, OnceFlag, RefCounter, Status, StatusCell};
use parking_lot::Mutex;
use serde::Serialize;

use crate::container::{AssetObject, AssetType, AsyncRequest, SceneObject};
use crate::handle::{
    AssetHandle, CompletionCallback, HandleCore, HandleSlot, OperationHandle, SceneHandle,
    SubAssetsHandle,
};
use crate::loader::{BundleLoader, LoaderStatus};

pub use self::kind::{ProviderKind, ProviderPayload};

/// Loading status of a provider. Declaration order is the forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum ProviderStatus {
    None = 0,
    CheckBundle,
    Loading,
    Checking,
    Success,
    Fail,
}

impl Status for ProviderStatus {
    fn code(self) -> u8 {
        self as u8
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::CheckBundle,
            2 => Self::Loading,
            3 => Self::Checking,
            4 => Self::Success,
            _ => Self::Fail,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::CheckBundle => "CHECK_BUNDLE",
            Self::Loading => "LOADING",
            Self::Checking => "CHECKING",
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
        };
        f.write_str(name)
    }
}

/// Identity of a provider inside the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub asset_path: String,
    pub asset_type: AssetType,
    pub kind: ProviderKind,
}

enum Extraction {
    /// Extracted on the calling thread.
    Ready(Option<ProviderPayload>),
    Pending(Box<dyn AsyncRequest<ProviderPayload>>),
}

#[derive(Default)]
struct ProviderState {
    handles: Vec<Arc<HandleSlot>>,
    extraction: Option<Extraction>,
    payload: Option<ProviderPayload>,
    last_error: Option<BundleError>,
}

/// Process-wide creation counter, so leaked providers can be ordered.
static NEXT_CREATION_TICK: AtomicU64 = AtomicU64::new(0);

pub struct ResourceProvider {
    key: ProviderKey,
    creation_tick: u64,
    created_at: Instant,
    owner: Option<Weak<BundleLoader>>,
    owner_name: String,

    status: StatusCell<ProviderStatus>,
    refs: RefCounter,
    destroyed: AtomicBool,
    /// Sticky: once set, `update` extracts blocking.
    wait_for_complete: AtomicBool,
    release_warning: OnceFlag,
    wait_warning: OnceFlag,
    signal: Arc<CompletionSignal>,

    state: Mutex<ProviderState>,
}

impl ResourceProvider {
    /// Creates a provider and registers it with `owner`, taking one reference
    /// on the loader. Without an owner the provider fails on its first update.
    pub fn new(
        asset_path: impl Into<String>,
        asset_type: AssetType,
        kind: ProviderKind,
        owner: Option<&Arc<BundleLoader>>,
    ) -> Arc<Self> {
        let provider = Arc::new(Self {
            key: ProviderKey {
                asset_path: asset_path.into(),
                asset_type,
                kind,
            },
            creation_tick: NEXT_CREATION_TICK.fetch_add(1, Ordering::Relaxed),
            created_at: Instant::now(),
            owner: owner.map(Arc::downgrade),
            owner_name: owner
                .map(|loader| loader.file().origin_path().to_string())
                .unwrap_or_default(),
            status: StatusCell::new(ProviderStatus::None),
            refs: RefCounter::new(),
            destroyed: AtomicBool::new(false),
            wait_for_complete: AtomicBool::new(false),
            release_warning: OnceFlag::new(),
            wait_warning: OnceFlag::new(),
            signal: Arc::new(CompletionSignal::new()),
            state: Mutex::new(ProviderState::default()),
        });

        if let Some(owner) = owner {
            owner.reference();
            owner.add_provider(&provider);
        }
        provider
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn key(&self) -> &ProviderKey {
        &self.key
    }

    #[inline]
    pub fn asset_path(&self) -> &str {
        &self.key.asset_path
    }

    #[inline]
    pub fn asset_type(&self) -> AssetType {
        self.key.asset_type
    }

    #[inline]
    pub fn kind(&self) -> ProviderKind {
        self.key.kind
    }

    /// Strictly increasing across every provider created in this process.
    #[inline]
    pub fn creation_tick(&self) -> u64 {
        self.creation_tick
    }

    /// Time since the provider was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    #[inline]
    pub fn status(&self) -> ProviderStatus {
        self.status.get()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    #[inline]
    pub fn ref_count(&self) -> i32 {
        self.refs.count()
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// The owning loader, while it is alive.
    pub fn owner(&self) -> Option<Arc<BundleLoader>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub fn last_error(&self) -> Option<BundleError> {
        self.state.lock().last_error.clone()
    }

    pub fn payload(&self) -> Option<ProviderPayload> {
        self.state.lock().payload.clone()
    }

    pub fn asset_object(&self) -> Option<AssetObject> {
        self.state
            .lock()
            .payload
            .as_ref()
            .and_then(ProviderPayload::asset_object)
            .cloned()
    }

    pub fn all_asset_objects(&self) -> Vec<AssetObject> {
        self.state
            .lock()
            .payload
            .as_ref()
            .and_then(ProviderPayload::sub_asset_objects)
            .map(<[AssetObject]>::to_vec)
            .unwrap_or_default()
    }

    pub fn scene_object(&self) -> Option<SceneObject> {
        self.state
            .lock()
            .payload
            .as_ref()
            .and_then(ProviderPayload::scene)
            .cloned()
    }

    /// 1.0 once done, the pending extraction's progress while loading, else 0.
    pub fn progress(&self) -> f32 {
        if self.is_done() {
            return 1.0;
        }
        match &self.state.lock().extraction {
            Some(Extraction::Pending(request)) => request.progress(),
            _ => 0.0,
        }
    }

    /// Set exactly once, when the provider completes (or is destroyed first).
    pub fn completion_signal(&self) -> Arc<CompletionSignal> {
        Arc::clone(&self.signal)
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Issues a new handle of the variant matching this provider's kind.
    /// This is the only way the reference count goes up.
    pub fn create_handle(self: &Arc<Self>) -> OperationHandle {
        let core = self.issue();
        match self.kind() {
            ProviderKind::Scene => OperationHandle::Scene(SceneHandle::from_core(core)),
            ProviderKind::SubAssets => OperationHandle::SubAssets(SubAssetsHandle::from_core(core)),
            ProviderKind::Asset => OperationHandle::Asset(AssetHandle::from_core(core)),
        }
    }

    pub(crate) fn issue(self: &Arc<Self>) -> HandleCore {
        self.refs.add();
        let slot = Arc::new(HandleSlot::new());
        self.state.lock().handles.push(Arc::clone(&slot));
        HandleCore::new(Arc::downgrade(self), slot)
    }

    /// Takes back a handle issued by this provider.
    ///
    /// # Panics
    /// If `slot` was not issued by this provider or was already released.
    pub fn release_handle(&self, slot: &Arc<HandleSlot>) {
        if self.refs.count() <= 0 && self.release_warning.trip() {
            log::warn!(
                "Provider '{}' reference count is already zero. There may be resource leaks!",
                self.asset_path()
            );
        }

        {
            let mut state = self.state.lock();
            let Some(index) = state.handles.iter().position(|h| Arc::ptr_eq(h, slot)) else {
                panic!(
                    "Handle released to provider '{}' was not issued by it or was already released",
                    self.asset_path()
                );
            };
            state.handles.remove(index);
        }
        slot.invalidate();

        self.refs.release();
    }

    /// Stores `callback` on `slot`, or hands it back if the provider is
    /// already done so the caller can invoke it right away.
    pub(crate) fn register_callback(
        &self,
        slot: &HandleSlot,
        callback: CompletionCallback,
    ) -> Option<CompletionCallback> {
        // Completion snapshots are taken under this lock, so a callback is
        // either stored before the snapshot or returned after it.
        let _state = self.state.lock();
        if self.is_done() {
            Some(callback)
        } else {
            slot.push_callback(callback);
            None
        }
    }

    // ========================================================================
    // State machine
    // ========================================================================

    pub fn update(&self) {
        if self.is_done() || self.is_destroyed() {
            return;
        }

        let snapshot = {
            let mut state = self.state.lock();
            let was_done = self.is_done();
            self.step(&mut state);
            (!was_done && self.is_done()).then(|| state.handles.clone())
        };

        if let Some(handles) = snapshot {
            self.invoke_completion(&handles);
        }
    }

    fn step(&self, state: &mut ProviderState) {
        if self.status() == ProviderStatus::None {
            self.status.advance(ProviderStatus::CheckBundle);
        }

        // 1. Wait for the owning bundle
        if self.status() == ProviderStatus::CheckBundle {
            let owner = match self.live_owner() {
                Ok(owner) => owner,
                Err(error) => return self.fail(state, error),
            };

            if self.is_waiting_for_complete() {
                owner.wait_for_async_complete();
            }
            if !owner.is_done() {
                return;
            }
            if owner.status() == LoaderStatus::Fail || !owner.has_container() {
                return self.fail(state, self.bundle_unavailable());
            }
            self.status.advance(ProviderStatus::Loading);
        }

        // 2. Start extracting
        if self.status() == ProviderStatus::Loading {
            let owner = match self.live_owner() {
                Ok(owner) => owner,
                Err(error) => return self.fail(state, error),
            };

            let kind = self.kind();
            let path = self.asset_path();
            let asset_type = self.asset_type();
            let blocking = self.is_waiting_for_complete();
            let extraction = owner.with_container(|container| {
                if blocking {
                    Extraction::Ready(kind.extract_blocking(container, path, &asset_type))
                } else {
                    Extraction::Pending(kind.extract_async(container, path, &asset_type))
                }
            });

            let Some(extraction) = extraction else {
                return self.fail(state, self.bundle_unavailable());
            };
            state.extraction = Some(extraction);
            self.status.advance(ProviderStatus::Checking);
        }

        // 3. Collect and verify the payload
        if self.status() == ProviderStatus::Checking {
            let payload = match state.extraction.take() {
                Some(Extraction::Ready(payload)) => payload,
                Some(Extraction::Pending(mut request)) => {
                    if self.is_waiting_for_complete() {
                        log::warn!(
                            "Suspending the calling thread to load asset '{}'",
                            self.asset_path()
                        );
                        request.wait();
                    } else if !request.is_done() {
                        state.extraction = Some(Extraction::Pending(request));
                        return;
                    }
                    request.take_result()
                }
                None => None,
            };

            match self.kind().validate(payload, self.asset_path(), &self.asset_type()) {
                Ok(payload) => {
                    state.payload = Some(payload);
                    self.status.advance(ProviderStatus::Success);
                }
                Err(error) => self.fail(state, error),
            }
        }
    }

    fn live_owner(&self) -> Result<Arc<BundleLoader>, BundleError> {
        match &self.owner {
            None => Err(BundleError::NoOwningBundle(self.asset_path().to_string())),
            Some(owner) => owner.upgrade().ok_or_else(|| self.bundle_unavailable()),
        }
    }

    fn bundle_unavailable(&self) -> BundleError {
        BundleError::BundleUnavailable {
            asset_path: self.asset_path().to_string(),
            bundle: self.owner_name.clone(),
        }
    }

    fn fail(&self, state: &mut ProviderState, error: BundleError) {
        log::error!("{error}");
        state.extraction = None;
        state.last_error = Some(error);
        self.status.advance(ProviderStatus::Fail);
    }

    /// Runs the callbacks of every handle still valid in `handles`, then sets
    /// the completion signal. No lock is held, so callbacks may create or
    /// release handles on this provider.
    fn invoke_completion(&self, handles: &[Arc<HandleSlot>]) {
        for slot in handles {
            for callback in slot.take_callbacks() {
                // A callback may release this or another handle.
                if !slot.is_valid() {
                    break;
                }
                callback(self);
            }
        }
        self.signal.set();
    }

    #[inline]
    fn is_waiting_for_complete(&self) -> bool {
        self.wait_for_complete.load(Ordering::Acquire)
    }

    /// Forces extraction on the calling thread.
    ///
    /// This can still fall short when the owning loader cannot complete
    /// synchronously (a download in flight); a warning is logged once and the
    /// caller must re-check [`Self::is_done`].
    pub fn wait_for_async_complete(&self) {
        self.wait_for_complete.store(true, Ordering::Release);
        self.update();

        if !self.is_done() && self.wait_warning.trip() {
            log::warn!("wait_for_async_complete failed to load '{}'", self.asset_path());
        }
    }

    // ========================================================================
    // Destruction
    // ========================================================================

    /// Done and no live handle.
    pub fn can_destroy(&self) -> bool {
        self.is_done() && self.refs.is_unreferenced()
    }

    /// Marks the provider destroyed and releases its reference on the owner.
    /// Later calls do nothing.
    ///
    /// Never takes this provider's state lock, so a loader may call it while
    /// holding its own.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(owner) = self.owner() {
            owner.release();
        }
        // Waiters of a provider torn down before completing must not hang.
        if !self.signal.is_set() {
            self.signal.set();
        }
    }
}

impl fmt::Debug for ResourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceProvider")
            .field("asset_path", &self.asset_path())
            .field("asset_type", &self.asset_type())
            .field("kind", &self.kind())
            .field("creation_tick", &self.creation_tick)
            .field("status", &self.status())
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}
