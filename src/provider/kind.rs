//! Provider kinds and what each one extracts.

use std::fmt;

use bundlekit_core::{BundleError, Result};
use serde::Serialize;

use crate::container::{AssetObject, AssetType, AsyncRequest, BundleContainer, SceneObject};

/// What a provider extracts from its bundle. Chosen when the provider is
/// created and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderKind {
    /// One object.
    Asset,
    /// Every object stored under the path.
    SubAssets,
    Scene,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Asset => "asset",
            Self::SubAssets => "sub-assets",
            Self::Scene => "scene",
        };
        f.write_str(name)
    }
}

/// The result a provider hands out. At most one shape is ever populated.
#[derive(Clone, Debug)]
pub enum ProviderPayload {
    Asset(AssetObject),
    SubAssets(Vec<AssetObject>),
    Scene(SceneObject),
}

impl ProviderPayload {
    pub fn asset_object(&self) -> Option<&AssetObject> {
        match self {
            Self::Asset(object) => Some(object),
            _ => None,
        }
    }

    pub fn sub_asset_objects(&self) -> Option<&[AssetObject]> {
        match self {
            Self::SubAssets(objects) => Some(objects),
            _ => None,
        }
    }

    pub fn scene(&self) -> Option<&SceneObject> {
        match self {
            Self::Scene(scene) => Some(scene),
            _ => None,
        }
    }
}

/// Adapts a container request to the payload shape of a provider kind.
struct PayloadRequest<T> {
    inner: Box<dyn AsyncRequest<T>>,
    wrap: fn(T) -> ProviderPayload,
}

impl<T: 'static> AsyncRequest<ProviderPayload> for PayloadRequest<T> {
    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn progress(&self) -> f32 {
        self.inner.progress()
    }

    fn wait(&mut self) {
        self.inner.wait();
    }

    fn take_result(&mut self) -> Option<ProviderPayload> {
        self.inner.take_result().map(self.wrap)
    }
}

impl ProviderKind {
    pub(crate) fn extract_blocking(
        self,
        container: &dyn BundleContainer,
        asset_path: &str,
        asset_type: &AssetType,
    ) -> Option<ProviderPayload> {
        match self {
            Self::Asset => container
                .load_asset(asset_path, asset_type)
                .map(ProviderPayload::Asset),
            Self::SubAssets => Some(ProviderPayload::SubAssets(
                container.load_sub_assets(asset_path, asset_type),
            )),
            Self::Scene => container.load_scene(asset_path).map(ProviderPayload::Scene),
        }
    }

    pub(crate) fn extract_async(
        self,
        container: &dyn BundleContainer,
        asset_path: &str,
        asset_type: &AssetType,
    ) -> Box<dyn AsyncRequest<ProviderPayload>> {
        match self {
            Self::Asset => Box::new(PayloadRequest {
                inner: container.load_asset_async(asset_path, asset_type),
                wrap: ProviderPayload::Asset,
            }),
            Self::SubAssets => Box::new(PayloadRequest {
                inner: container.load_sub_assets_async(asset_path, asset_type),
                wrap: ProviderPayload::SubAssets,
            }),
            Self::Scene => Box::new(PayloadRequest {
                inner: container.load_scene_async(asset_path),
                wrap: ProviderPayload::Scene,
            }),
        }
    }

    /// Accepts an extracted payload only if it exists and has the requested type.
    pub(crate) fn validate(
        self,
        payload: Option<ProviderPayload>,
        asset_path: &str,
        asset_type: &AssetType,
    ) -> Result<ProviderPayload> {
        let not_found = || BundleError::AssetNotFound {
            asset_path: asset_path.to_string(),
            type_name: asset_type.name(),
        };
        let mismatch = || BundleError::TypeMismatch {
            asset_path: asset_path.to_string(),
            expected: asset_type.name(),
        };

        match payload {
            None => Err(not_found()),
            Some(ProviderPayload::Asset(object)) => {
                if asset_type.matches(&object) {
                    Ok(ProviderPayload::Asset(object))
                } else {
                    Err(mismatch())
                }
            }
            Some(ProviderPayload::SubAssets(objects)) => {
                if objects.is_empty() {
                    Err(not_found())
                } else if objects.iter().all(|object| asset_type.matches(object)) {
                    Ok(ProviderPayload::SubAssets(objects))
                } else {
                    Err(mismatch())
                }
            }
            Some(scene @ ProviderPayload::Scene(_)) => Ok(scene),
        }
    }
}
