//! Operation Handle System
//!
//! Handles are the caller-facing side of a [`ResourceProvider`]. Each handle
//! is one reference on its provider; dropping or releasing it gives the
//! reference back.
//!
//! # Design Principles
//! - The provider owns the list of issued [`HandleSlot`]s and uses it only to
//!   deliver completion callbacks
//! - A handle holds a `Weak` back-reference and never keeps its provider alive
//! - Releasing consumes the handle, so the same handle cannot be released twice
//! - A released slot never receives a callback
//! - A slot may carry any number of callbacks

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bundlekit_core::BundleError;
use parking_lot::Mutex;

use crate::container::{AssetObject, SceneObject};
use crate::provider::{ProviderKind, ProviderPayload, ProviderStatus, ResourceProvider};

/// Invoked once when the provider reaches Success or Fail.
pub type CompletionCallback = Box<dyn FnOnce(&ResourceProvider) + Send>;

/// Provider-side record of one issued handle.
pub struct HandleSlot {
    valid: AtomicBool,
    callbacks: Mutex<Vec<CompletionCallback>>,
}

impl HandleSlot {
    pub(crate) fn new() -> Self {
        Self {
            valid: AtomicBool::new(true),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
        self.callbacks.lock().clear();
    }

    pub(crate) fn push_callback(&self, callback: CompletionCallback) {
        self.callbacks.lock().push(callback);
    }

    /// Registered callbacks in registration order.
    pub(crate) fn take_callbacks(&self) -> Vec<CompletionCallback> {
        std::mem::take(&mut *self.callbacks.lock())
    }
}

impl fmt::Debug for HandleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSlot")
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// State shared by every handle variant.
pub struct HandleCore {
    provider: Weak<ResourceProvider>,
    slot: Arc<HandleSlot>,
}

impl HandleCore {
    pub(crate) fn new(provider: Weak<ResourceProvider>, slot: Arc<HandleSlot>) -> Self {
        Self { provider, slot }
    }

    /// The provider, while it is alive.
    pub fn provider(&self) -> Option<Arc<ResourceProvider>> {
        self.provider.upgrade()
    }

    /// The slot this handle occupies in its provider.
    #[inline]
    pub fn slot(&self) -> &Arc<HandleSlot> {
        &self.slot
    }

    /// Not released, and the provider is alive and not destroyed.
    pub fn is_valid(&self) -> bool {
        self.slot.is_valid()
            && self
                .provider()
                .is_some_and(|provider| !provider.is_destroyed())
    }

    /// `Fail` once the provider is gone.
    pub fn status(&self) -> ProviderStatus {
        self.provider()
            .map_or(ProviderStatus::Fail, |provider| provider.status())
    }

    pub fn is_done(&self) -> bool {
        self.status() >= ProviderStatus::Success
    }

    pub fn progress(&self) -> f32 {
        self.provider().map_or(0.0, |provider| provider.progress())
    }

    pub fn last_error(&self) -> Option<BundleError> {
        self.provider().and_then(|provider| provider.last_error())
    }

    /// Calls `callback` once the provider completes, or right away if it
    /// already has. Ignored on an invalid handle. Callbacks accumulate and
    /// run in registration order.
    pub fn on_completed(&self, callback: impl FnOnce(&ResourceProvider) + Send + 'static) {
        if !self.slot.is_valid() {
            return;
        }
        let Some(provider) = self.provider() else {
            return;
        };
        if let Some(callback) = provider.register_callback(&self.slot, Box::new(callback)) {
            callback(&provider);
        }
    }

    /// See [`ResourceProvider::wait_for_async_complete`].
    pub fn wait_for_async_complete(&self) {
        if let Some(provider) = self.provider() {
            provider.wait_for_async_complete();
        }
    }

    /// Resolves with the payload once the provider completes.
    ///
    /// Someone still has to drive `update`; the future only waits.
    pub fn task(&self) -> impl Future<Output = Option<ProviderPayload>> + 'static {
        let provider = Weak::clone(&self.provider);
        async move {
            let signal = provider.upgrade()?.completion_signal();
            signal.wait_async().await;
            provider.upgrade()?.payload()
        }
    }

    fn release_inner(&self) {
        if !self.slot.is_valid() {
            return;
        }
        if let Some(provider) = self.provider() {
            provider.release_handle(&self.slot);
        } else {
            self.slot.invalidate();
        }
    }
}

impl Drop for HandleCore {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for HandleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCore")
            .field("status", &self.status())
            .field("valid", &self.is_valid())
            .finish()
    }
}

macro_rules! handle_variant {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name(HandleCore);

        impl $name {
            pub(crate) fn from_core(core: HandleCore) -> Self {
                Self(core)
            }

            /// Gives the reference back to the provider.
            pub fn release(self) {
                drop(self);
            }
        }

        impl Deref for $name {
            type Target = HandleCore;

            fn deref(&self) -> &HandleCore {
                &self.0
            }
        }
    };
}

handle_variant!(
    /// Handle to a single extracted object.
    AssetHandle
);

handle_variant!(
    /// Handle to every object stored under one path.
    SubAssetsHandle
);

handle_variant!(
    /// Handle to a loaded scene.
    SceneHandle
);

impl AssetHandle {
    pub fn asset_object(&self) -> Option<AssetObject> {
        self.provider()?.asset_object()
    }

    /// The extracted object, downcast to `T`.
    pub fn asset<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.asset_object()?.downcast::<T>().ok()
    }
}

impl SubAssetsHandle {
    pub fn all_asset_objects(&self) -> Vec<AssetObject> {
        self.provider()
            .map(|provider| provider.all_asset_objects())
            .unwrap_or_default()
    }

    /// Every extracted object that is a `T`.
    pub fn all_assets<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.all_asset_objects()
            .into_iter()
            .filter_map(|object| object.downcast::<T>().ok())
            .collect()
    }
}

impl SceneHandle {
    pub fn scene(&self) -> Option<SceneObject> {
        self.provider()?.scene_object()
    }
}

/// A handle of the variant matching its provider's [`ProviderKind`].
#[derive(Debug)]
pub enum OperationHandle {
    Asset(AssetHandle),
    SubAssets(SubAssetsHandle),
    Scene(SceneHandle),
}

impl OperationHandle {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Asset(_) => ProviderKind::Asset,
            Self::SubAssets(_) => ProviderKind::SubAssets,
            Self::Scene(_) => ProviderKind::Scene,
        }
    }

    pub fn into_asset(self) -> Option<AssetHandle> {
        match self {
            Self::Asset(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_sub_assets(self) -> Option<SubAssetsHandle> {
        match self {
            Self::SubAssets(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_scene(self) -> Option<SceneHandle> {
        match self {
            Self::Scene(handle) => Some(handle),
            _ => None,
        }
    }

    /// Gives the reference back to the provider.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for OperationHandle {
    type Target = HandleCore;

    fn deref(&self) -> &HandleCore {
        match self {
            Self::Asset(handle) => &handle.0,
            Self::SubAssets(handle) => &handle.0,
            Self::Scene(handle) => &handle.0,
        }
    }
}
