//! Serializable snapshot of the registry, for diagnostics and tooling.

use serde::Serialize;

use crate::loader::{BundleLoader, LoaderStatus};
use crate::provider::{ProviderKind, ProviderStatus, ResourceProvider};

#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub origin_path: String,
    pub status: LoaderStatus,
    pub ref_count: i32,
    pub provider_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BundleReport {
    pub(crate) fn of(loader: &BundleLoader) -> Self {
        Self {
            origin_path: loader.file().origin_path().to_string(),
            status: loader.status(),
            ref_count: loader.ref_count(),
            provider_count: loader.provider_count(),
            error: loader.last_error().map(|error| error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub asset_path: String,
    pub asset_type: &'static str,
    pub kind: ProviderKind,
    pub status: ProviderStatus,
    pub ref_count: i32,
    /// Creation order across the process.
    pub creation_tick: u64,
    pub age_ms: u64,
    /// `None` for providers whose path no bundle contains.
    pub bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderReport {
    pub(crate) fn of(provider: &ResourceProvider) -> Self {
        Self {
            asset_path: provider.asset_path().to_string(),
            asset_type: provider.asset_type().name(),
            kind: provider.kind(),
            status: provider.status(),
            ref_count: provider.ref_count(),
            creation_tick: provider.creation_tick(),
            age_ms: u64::try_from(provider.age().as_millis()).unwrap_or(u64::MAX),
            bundle: provider
                .owner()
                .map(|loader| loader.file().origin_path().to_string()),
            error: provider.last_error().map(|error| error.to_string()),
        }
    }
}

/// Bundles and providers, each sorted by path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetSystemReport {
    pub bundles: Vec<BundleReport>,
    pub providers: Vec<ProviderReport>,
}

impl AssetSystemReport {
    pub(crate) fn new(mut bundles: Vec<BundleReport>, mut providers: Vec<ProviderReport>) -> Self {
        bundles.sort_by(|a, b| a.origin_path.cmp(&b.origin_path));
        providers.sort_by(|a, b| {
            a.asset_path
                .cmp(&b.asset_path)
                .then_with(|| a.asset_type.cmp(b.asset_type))
        });
        Self { bundles, providers }
    }
}
