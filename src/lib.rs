#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Reference-counted loading of assets packed into bundle files.
//!
//! A [`BundleLoader`] fetches and decodes one bundle. A [`ResourceProvider`]
//! extracts one asset, collection or scene from a decoded bundle and hands it
//! out through operation handles. The [`AssetSystem`] registry deduplicates
//! both and frees them once nothing references them.

pub mod container;
pub mod handle;
pub mod io;
pub mod loader;
pub mod provider;
pub mod settings;
pub mod system;

pub use bundlekit_core::{BundleError, CompletionSignal, Result};

pub use container::{
    AssetObject, AssetType, AsyncRequest, BoxedContainer, BundleContainer, ReadyRequest,
    SceneObject,
};
pub use handle::{
    AssetHandle, CompletionCallback, HandleCore, HandleSlot, OperationHandle, SceneHandle,
    SubAssetsHandle,
};
pub use io::{
    BundleDecoder, BundleResolver, DecryptionService, DiskFileLocator, DownloadService,
    DownloadTask, FileLocator, LoaderServices,
};
pub use loader::file::{BundleFileInfo, FileMeta, UpdateEntry};
pub use loader::{BundleLoader, LoaderStatus};
pub use provider::{ProviderKey, ProviderKind, ProviderPayload, ProviderStatus, ResourceProvider};
pub use settings::{AssetSystemSettings, LoaderSettings};
pub use system::AssetSystem;
pub use system::report::{AssetSystemReport, BundleReport, ProviderReport};
