//! Asset System
//!
//! The registry that owns every [`BundleLoader`] and [`ResourceProvider`].
//! Loaders are deduplicated by their [`BundleFileInfo`], providers by
//! `(asset path, type, kind)`. The system is cheap to clone; clones share
//! the same storages.
//!
//! ```rust,ignore
//! let system = AssetSystem::new(settings, services, resolver);
//! let handle = system.load_asset_async::<Texture>("ui/logo.png");
//!
//! // once per frame
//! system.update();
//!
//! if let Some(texture) = handle.asset::<Texture>() { /* ... */ }
//! ```

pub mod report;
pub mod storage;

use std::any::Any;
use std::sync::Arc;

use bundlekit_core::{BundleError, Result};
use slotmap::new_key_type;

use crate::container::AssetType;
use crate::handle::{AssetHandle, SceneHandle, SubAssetsHandle};
use crate::io::{BundleResolver, LoaderServices};
use crate::loader::BundleLoader;
use crate::loader::file::BundleFileInfo;
use crate::provider::{ProviderKey, ProviderKind, ResourceProvider};
use crate::settings::AssetSystemSettings;

use self::report::{AssetSystemReport, BundleReport, ProviderReport};
use self::storage::KeyedStorage;

new_key_type! {
    pub struct LoaderId;
    pub struct ProviderId;
}

type LoaderStorage = KeyedStorage<LoaderId, BundleFileInfo, BundleLoader>;
type ProviderStorage = KeyedStorage<ProviderId, ProviderKey, ResourceProvider>;

#[derive(Clone)]
pub struct AssetSystem {
    settings: AssetSystemSettings,
    services: LoaderServices,
    resolver: Arc<dyn BundleResolver>,

    loaders: Arc<LoaderStorage>,
    providers: Arc<ProviderStorage>,
}

impl AssetSystem {
    pub fn new(
        settings: AssetSystemSettings,
        services: LoaderServices,
        resolver: Arc<dyn BundleResolver>,
    ) -> Self {
        Self {
            settings,
            services,
            resolver,
            loaders: Arc::new(KeyedStorage::new()),
            providers: Arc::new(KeyedStorage::new()),
        }
    }

    #[inline]
    pub fn settings(&self) -> &AssetSystemSettings {
        &self.settings
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Starts loading one object of type `T`. The result arrives over the
    /// following [`Self::update`] calls.
    pub fn load_asset_async<T: Any + Send + Sync>(&self, asset_path: &str) -> AssetHandle {
        let provider = self.provider_for(asset_path, AssetType::of::<T>(), ProviderKind::Asset);
        AssetHandle::from_core(provider.issue())
    }

    /// Starts loading every `T` stored under `asset_path`.
    pub fn load_sub_assets_async<T: Any + Send + Sync>(&self, asset_path: &str) -> SubAssetsHandle {
        let provider =
            self.provider_for(asset_path, AssetType::of::<T>(), ProviderKind::SubAssets);
        SubAssetsHandle::from_core(provider.issue())
    }

    pub fn load_scene_async(&self, scene_path: &str) -> SceneHandle {
        let provider = self.provider_for(scene_path, AssetType::of::<()>(), ProviderKind::Scene);
        SceneHandle::from_core(provider.issue())
    }

    /// Like [`Self::load_asset_async`], then forces completion on the calling
    /// thread. A bundle that is still downloading may not finish; check
    /// [`crate::HandleCore::is_done`].
    pub fn load_asset_sync<T: Any + Send + Sync>(&self, asset_path: &str) -> AssetHandle {
        let handle = self.load_asset_async::<T>(asset_path);
        handle.wait_for_async_complete();
        handle
    }

    pub fn load_sub_assets_sync<T: Any + Send + Sync>(&self, asset_path: &str) -> SubAssetsHandle {
        let handle = self.load_sub_assets_async::<T>(asset_path);
        handle.wait_for_async_complete();
        handle
    }

    pub fn load_scene_sync(&self, scene_path: &str) -> SceneHandle {
        let handle = self.load_scene_async(scene_path);
        handle.wait_for_async_complete();
        handle
    }

    /// Loads synchronously and hands back the object itself. The handle is
    /// released before returning; the object stays cached until the next
    /// [`Self::unload_unused_assets`].
    pub fn load_asset_blocking<T: Any + Send + Sync>(&self, asset_path: &str) -> Result<Arc<T>> {
        let handle = self.load_asset_sync::<T>(asset_path);
        if let Some(asset) = handle.asset::<T>() {
            return Ok(asset);
        }
        Err(handle
            .last_error()
            .unwrap_or_else(|| BundleError::LoadIncomplete(asset_path.to_string())))
    }

    fn provider_for(
        &self,
        asset_path: &str,
        asset_type: AssetType,
        kind: ProviderKind,
    ) -> Arc<ResourceProvider> {
        let key = ProviderKey {
            asset_path: asset_path.to_string(),
            asset_type,
            kind,
        };
        self.providers.get_or_insert_with(&key, || {
            let owner = self.loader_for(asset_path);
            ResourceProvider::new(asset_path, asset_type, kind, owner.as_ref())
        })
    }

    fn loader_for(&self, asset_path: &str) -> Option<Arc<BundleLoader>> {
        let Some(file) = self.resolver.resolve(asset_path) else {
            log::debug!("No bundle contains '{asset_path}'");
            return None;
        };
        let loader = self.loaders.get_or_insert_with(&file, || {
            log::trace!("Creating loader for bundle '{}'", file.origin_path());
            Arc::new(BundleLoader::new(
                file.clone(),
                self.services.clone(),
                self.settings.loader,
            ))
        });
        Some(loader)
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Advances every loader, then every provider, by one tick.
    pub fn update(&self) {
        for loader in self.loaders.values() {
            loader.update();
        }
        for provider in self.providers.values() {
            provider.update();
        }

        if self.settings.auto_unload_unused {
            self.unload_unused_assets();
        }
    }

    // ========================================================================
    // Unloading
    // ========================================================================

    /// Destroys every provider without live handles, and every loader left
    /// without dependents. A bundle's providers go all together or not at all.
    pub fn unload_unused_assets(&self) {
        let mut detached = 0_usize;
        for loader in self.loaders.values() {
            detached += loader.try_destroy_all_providers().len();
        }

        for provider in self.providers.values() {
            if provider.owner().is_none() && provider.can_destroy() {
                provider.destroy();
            }
        }
        let removed_providers = self.providers.remove_where(ResourceProvider::is_destroyed);

        let removed_loaders = self.loaders.remove_where(BundleLoader::can_destroy);
        for loader in &removed_loaders {
            loader.destroy(false);
        }

        if !removed_providers.is_empty() || !removed_loaders.is_empty() {
            log::debug!(
                "Unloaded {} providers ({} detached from bundles) and {} bundles",
                removed_providers.len(),
                detached,
                removed_loaders.len()
            );
        }
    }

    /// Tears everything down regardless of outstanding handles. Handles that
    /// are still alive become invalid.
    pub fn force_unload_all_assets(&self) {
        for provider in self.providers.drain() {
            provider.destroy();
        }
        for loader in self.loaders.drain() {
            loader.destroy(true);
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn loader(&self, file: &BundleFileInfo) -> Option<Arc<BundleLoader>> {
        self.loaders.get_by_key(file)
    }

    pub fn provider(&self, key: &ProviderKey) -> Option<Arc<ResourceProvider>> {
        self.providers.get_by_key(key)
    }

    pub fn debug_report(&self) -> AssetSystemReport {
        let bundles = self
            .loaders
            .values()
            .iter()
            .map(|loader| BundleReport::of(loader))
            .collect();
        let providers = self
            .providers
            .values()
            .iter()
            .map(|provider| ProviderReport::of(provider))
            .collect();
        AssetSystemReport::new(bundles, providers)
    }
}

impl std::fmt::Debug for AssetSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetSystem")
            .field("settings", &self.settings)
            .field("loaders", &self.loader_count())
            .field("providers", &self.provider_count())
            .finish_non_exhaustive()
    }
}
