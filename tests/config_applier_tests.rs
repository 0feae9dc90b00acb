mod common;

use common::{scratch_dir, wait_for, CountingProvider, FakeSurfaceFactory, FixedIdleSource, SurfaceLog};
use ruanm_screensaver::config_applier::ConfigApplier;
use ruanm_screensaver::error::ScreensaverError;
use ruanm_screensaver::idle::IdleMonitor;
use ruanm_screensaver::screensaver::ScreensaverController;
use ruanm_screensaver::settings::{Settings, SettingsPatch, SharedSettings};
use ruanm_screensaver::settings_store::SettingsStore;
use ruanm_screensaver::{CoreBackends, ScreensaverCore};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn core_at(path: &Path, idle: Duration) -> (ScreensaverCore, Arc<SurfaceLog>) {
    let (factory, surfaces) = FakeSurfaceFactory::new();
    let backends = CoreBackends {
        surfaces: factory,
        wallpapers: Arc::new(CountingProvider::default()),
        idle_source: FixedIdleSource::new(idle),
    };
    let core = ScreensaverCore::new(SettingsStore::new(path), Settings::default(), backends, None).unwrap();
    (core, surfaces)
}

#[test]
fn test_apply_persists_and_commits() {
    let dir = scratch_dir("apply");
    let path = dir.join("settings.json");
    let (mut core, _) = core_at(&path, Duration::ZERO);

    let applied = core
        .apply_settings(&SettingsPatch::new().set("wallpaperKeyword", "star").set("timeFontSize", 64))
        .unwrap();
    assert_eq!(applied.wallpaper_keyword, "star");
    assert_eq!(applied.display.time_font_size, 64);
    assert_eq!(core.settings(), applied);

    let reloaded = SettingsStore::new(&path).load();
    assert_eq!(reloaded, applied);

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_persistence_failure_leaves_settings_unchanged() {
    let dir = scratch_dir("persist_fail");
    let blocker = dir.join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let (mut core, surfaces) = core_at(&blocker.join("settings.json"), Duration::ZERO);

    core.lock_now().unwrap();
    let before = core.settings();

    let result = core.apply_settings(&SettingsPatch::new().set("wallpaperKeyword", "car"));
    assert!(matches!(result, Err(ScreensaverError::Persistence { .. })));
    assert_eq!(core.settings(), before);
    // The live session never saw the rejected settings
    assert_eq!(surfaces.applied.lock().len(), 1);

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_invalid_value_is_rejected() {
    let dir = scratch_dir("invalid");
    let path = dir.join("settings.json");
    let (mut core, _) = core_at(&path, Duration::ZERO);

    let result = core.apply_settings(&SettingsPatch::new().set("lockTime", "soon"));
    assert!(matches!(result, Err(ScreensaverError::Configuration(_))));
    assert_eq!(core.settings(), Settings::default());
    assert!(!path.exists());

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_unknown_keys_are_ignored() {
    let dir = scratch_dir("unknown");
    let path = dir.join("settings.json");
    let (mut core, _) = core_at(&path, Duration::ZERO);

    let applied = core
        .apply_settings(&SettingsPatch::new().set("bogusKey", 1).set("theme", "dark"))
        .unwrap();
    assert_eq!(applied.display.theme, "dark");
    let saved = fs::read_to_string(&path).unwrap();
    assert!(!saved.contains("bogusKey"));

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_enabling_lock_screen_arms_idle_detection() {
    let dir = scratch_dir("idle_restart");
    let (mut core, surfaces) = core_at(&dir.join("settings.json"), Duration::from_secs(3600));
    core.start();

    thread::sleep(Duration::from_millis(200));
    assert_eq!(surfaces.opened(), 0);

    core.apply_settings(
        &SettingsPatch::new()
            .set("enableLockScreen", true)
            .set("lockTime", 1)
            .set("lockTimeUnit", "second"),
    )
    .unwrap();

    assert!(wait_for(Duration::from_secs(5), || core.controller().is_active()));
    assert_eq!(surfaces.opened(), 1);

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_debounced_patches_apply_once() {
    let dir = scratch_dir("debounce");
    let path = dir.join("settings.json");
    let (mut core, surfaces) = core_at(&path, Duration::ZERO);
    core.lock_now().unwrap();

    core.submit_settings(SettingsPatch::new().set("wallpaperKeyword", "game"));
    core.submit_settings(SettingsPatch::new().set("theme", "dark"));
    core.submit_settings(SettingsPatch::new().set("wallpaperKeyword", "cool"));
    assert_eq!(core.settings(), Settings::default());

    assert!(wait_for(Duration::from_secs(3), || core.settings().wallpaper_keyword == "cool"));
    thread::sleep(Duration::from_millis(200));

    let settings = core.settings();
    assert_eq!(settings.display.theme, "dark");
    // One surface update at open plus one for the coalesced patch
    assert_eq!(surfaces.applied.lock().len(), 2);
    assert_eq!(SettingsStore::new(&path).load(), settings);

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_shutdown_flushes_pending_patch() {
    let dir = scratch_dir("flush");
    let path = dir.join("settings.json");
    let (mut core, _) = core_at(&path, Duration::ZERO);

    core.submit_settings(SettingsPatch::new().set("wallpaperKeyword", "photo"));
    core.shutdown();

    assert_eq!(core.settings().wallpaper_keyword, "photo");
    assert_eq!(SettingsStore::new(&path).load().wallpaper_keyword, "photo");
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_logging_hook_runs_only_for_logging_changes() {
    let dir = scratch_dir("logging_hook");
    let (factory, _) = FakeSurfaceFactory::new();
    let settings = SharedSettings::new(Settings::default());
    let controller = ScreensaverController::new(
        settings.clone(),
        factory,
        Arc::new(CountingProvider::default()),
        Arc::new(IdleMonitor::new(FixedIdleSource::new(Duration::ZERO))),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let applier = ConfigApplier::new(SettingsStore::new(dir.join("settings.json")), settings, controller)
        .with_logging_hook(Arc::new(move |_: &Settings| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));

    applier.apply(&SettingsPatch::new().set("wallpaperKeyword", "car")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    applier.apply(&SettingsPatch::new().set("debugMode", true)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(applier.current().debug_mode);

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_export_then_import_restores_settings() {
    let dir = scratch_dir("export");
    let export = dir.join("backup.rwapr");

    let (mut source, _) = core_at(&dir.join("a.json"), Duration::ZERO);
    source
        .apply_settings(
            &SettingsPatch::new()
                .set("wallpaperKeyword", "cartoon")
                .set("enablePasswordProtection", true)
                .set("password", "hunter2"),
        )
        .unwrap();
    source.export_settings(&export).unwrap();

    let (mut target, _) = core_at(&dir.join("b.json"), Duration::ZERO);
    let imported = target.import_settings(&export).unwrap();
    assert_eq!(imported, source.settings());
    assert_eq!(SettingsStore::new(dir.join("b.json")).load(), imported);

    source.shutdown();
    target.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_export_to_dir_writes_importable_file() {
    let dir = scratch_dir("export_dir");
    let (mut core, _) = core_at(&dir.join("settings.json"), Duration::ZERO);
    core.apply_settings(&SettingsPatch::new().set("theme", "dark")).unwrap();

    let path = core.export_settings_to_dir(&dir).unwrap();

    assert_eq!(path.parent(), Some(dir.as_path()));
    assert!(ruanm_screensaver::settings_export::is_export_file(&path));
    let patch = ruanm_screensaver::settings_export::read_export(&path).unwrap();
    assert_eq!(Settings::default().merged(&patch).unwrap(), core.settings());

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_import_rejects_incomplete_export() {
    let dir = scratch_dir("bad_import");
    let export = dir.join("broken.rwapr");
    fs::write(&export, r#"{"settings": {"theme": "dark"}}"#).unwrap();

    let (mut core, _) = core_at(&dir.join("settings.json"), Duration::ZERO);
    assert!(core.import_settings(&export).is_err());
    assert_eq!(core.settings(), Settings::default());

    core.shutdown();
    fs::remove_dir_all(dir).ok();
}
