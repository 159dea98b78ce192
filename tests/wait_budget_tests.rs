//! Synchronous Wait Budget Tests
//!
//! Tests for:
//! - A loader whose download never completes gives up after the iteration
//!   budget and stays unfinished
//! - The give-up warning is logged once per loader, however often it is hit
//! - The provider-level warning for a forced completion that falls short
//! - The over-release warning on a loader, logged once
//!
//! The tests share one capturing logger, so each uses its own bundle name and
//! only looks at records that mention it.

mod common;

use std::sync::Arc;
use std::sync::Once;

use bundlekit::{
    AssetType, BundleContainer, BundleLoader, LoaderSettings, LoaderStatus, ProviderKind,
    ProviderStatus, ResourceProvider,
};
use common::{BundleContents, DownloadBehavior, Fixture};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records
            .lock()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    records: parking_lot::const_mutex(Vec::new()),
};
static INSTALL: Once = Once::new();

fn install_logger() {
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger is installed in this test binary");
        log::set_max_level(LevelFilter::Trace);
    });
}

fn warnings_containing(needle: &str) -> Vec<String> {
    LOGGER
        .records
        .lock()
        .iter()
        .filter(|(level, message)| *level == Level::Warn && message.contains(needle))
        .map(|(_, message)| message.clone())
        .collect()
}

fn hanging_loader(name: &str, budget: u32) -> (Fixture, Arc<BundleLoader>) {
    install_logger();
    // Not `Fixture::new`: it would try to install env_logger.
    let fixture = Fixture::default();
    fixture.downloader.set_behavior(DownloadBehavior::Hang);
    let file = fixture.remote_bundle(name, BundleContents::default());
    let settings = LoaderSettings {
        wait_iteration_budget: budget,
        ..LoaderSettings::default()
    };
    let loader = Arc::new(BundleLoader::new(file, fixture.services(), settings));
    (fixture, loader)
}

#[test]
fn hanging_download_exhausts_the_default_budget() {
    let budget = LoaderSettings::default().wait_iteration_budget;
    let (fixture, loader) = hanging_loader("hang-default.bundle", budget);

    loader.wait_for_async_complete();

    assert!(!loader.is_done());
    assert_eq!(loader.status(), LoaderStatus::CheckDownload);
    assert_eq!(fixture.downloader.request_count(), 1);
    assert_eq!(fixture.decoder.async_count() + fixture.decoder.blocking_count(), 0);
    assert_eq!(warnings_containing("'hang-default.bundle'").len(), 1);
}

#[test]
fn give_up_warning_is_logged_once() {
    let (_fixture, loader) = hanging_loader("hang-repeat.bundle", 16);

    loader.wait_for_async_complete();
    loader.wait_for_async_complete();
    loader.wait_for_async_complete();

    assert!(!loader.is_done());
    let warnings = warnings_containing("'hang-repeat.bundle'");
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("gave up"));
    assert!(warnings[0].contains("CHECK_DOWNLOAD"));
}

#[test]
fn zero_budget_returns_without_updating() {
    let (fixture, loader) = hanging_loader("hang-zero.bundle", 0);

    loader.wait_for_async_complete();

    assert_eq!(loader.status(), LoaderStatus::None);
    assert_eq!(fixture.downloader.request_count(), 0);
    assert_eq!(warnings_containing("'hang-zero.bundle'").len(), 1);
}

#[test]
fn forced_provider_behind_hanging_bundle_warns_once() {
    let (_fixture, loader) = hanging_loader("hang-provider.bundle", 8);
    let provider = ResourceProvider::new(
        "hang-provider/asset",
        AssetType::of::<String>(),
        ProviderKind::Asset,
        Some(&loader),
    );

    provider.wait_for_async_complete();
    provider.wait_for_async_complete();

    assert_eq!(provider.status(), ProviderStatus::CheckBundle);
    assert_eq!(warnings_containing("'hang-provider/asset'").len(), 1);
    assert_eq!(warnings_containing("'hang-provider.bundle'").len(), 1);
}

#[test]
fn download_that_lands_within_budget_completes() {
    install_logger();
    let fixture = Fixture::default();
    fixture.downloader.set_behavior(DownloadBehavior::Succeed(5));
    let file = fixture.remote_bundle("lands.bundle", BundleContents::default());
    let settings = LoaderSettings {
        wait_iteration_budget: 8,
        ..LoaderSettings::default()
    };
    let loader = BundleLoader::new(file, fixture.services(), settings);

    loader.wait_for_async_complete();

    assert_eq!(loader.status(), LoaderStatus::Success);
    assert!(loader.with_container(|_: &dyn BundleContainer| ()).is_some());
    assert!(warnings_containing("'lands.bundle'").is_empty());
}

#[test]
fn over_release_warning_is_logged_once() {
    install_logger();
    let fixture = Fixture::default();
    let file = fixture.local_bundle("over-release.bundle", BundleContents::default());
    let loader = BundleLoader::new(file, fixture.services(), LoaderSettings::default());

    loader.reference();
    loader.release();
    assert!(warnings_containing("'over-release.bundle'").is_empty());

    loader.release();
    loader.release();

    assert_eq!(loader.ref_count(), -2);
    let warnings = warnings_containing("'over-release.bundle'");
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("released more often than referenced"));
}
