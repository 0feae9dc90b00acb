// Ruanm Screensaver - tray application hosting the lock screen
// Watches for idle time, shows rotating wallpapers and drives self-update

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use ruanm_screensaver::constants::{CURRENT_VERSION, LOG_DIR_NAME, SETTINGS_FILE_NAME, WALLPAPER_CATEGORIES};
use ruanm_screensaver::error::ScreensaverError;
use ruanm_screensaver::idle::system::SystemIdleSource;
use ruanm_screensaver::screensaver::{LockPhase, ScreensaverController};
use ruanm_screensaver::settings_export::is_export_file;
use ruanm_screensaver::settings_store::SettingsStore;
use ruanm_screensaver::ui::tray::{TrayAction, TrayMenu};
use ruanm_screensaver::ui::window_surface::{SurfaceHost, WindowSurfaceFactory};
use ruanm_screensaver::ui::{notifications, UiEvent};
use ruanm_screensaver::update::download::DownloadProgress;
use ruanm_screensaver::update::UpdateOrchestrator;
use ruanm_screensaver::wallpaper::{HttpWallpaperProvider, WallpaperProvider};
use ruanm_screensaver::{config, logging, CoreBackends, ScreensaverCore};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tao::event::Event;
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tray_icon::menu::MenuEvent;

/// Idle-activated lock screen with rotating wallpapers
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Idle-activated lock screen with rotating wallpapers",
    long_about = "Runs in the system tray and shows a full-screen lock surface with rotating
wallpapers once the machine has been idle for the configured time.

Settings are stored in settings.json under the per-user config directory
(override with RUANM_SCREENSAVER_CONFIG_DIR). Passing a .rwapr file imports
the settings it contains."
)]
struct Args {
    /// Show the lock screen immediately (also accepted as /s)
    #[arg(short, long, alias = "lock-screen")]
    screensaver: bool,

    /// Query the wallpaper API once per category and exit
    #[arg(long)]
    api_test: bool,

    /// Exported settings (.rwapr) to import on startup
    settings_file: Option<PathBuf>,
}

/// Accept the Windows screensaver switch `/s` alongside `--screensaver`
fn normalize_args(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|arg| match arg.as_str() {
        "/s" | "/S" => "--screensaver".to_string(),
        _ => arg,
    })
    .collect()
}

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_args(std::env::args()));

    let app_dir = config::app_dir()?;
    let log_dir = app_dir.join(LOG_DIR_NAME);
    let store = SettingsStore::new(app_dir.join(SETTINGS_FILE_NAME));
    let (settings, load_report) = store.load_with_report();
    logging::init(&settings, &log_dir);
    load_report.log();

    info!("Starting Ruanm Screensaver v{}", CURRENT_VERSION);
    debug!("Settings file: {}", store.path().display());

    if args.api_test {
        return run_api_test();
    }

    let event_loop = EventLoopBuilder::<UiEvent>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let backends = CoreBackends {
        surfaces: Arc::new(WindowSurfaceFactory::new(proxy.clone())),
        wallpapers: Arc::new(HttpWallpaperProvider::new()?),
        idle_source: Arc::new(SystemIdleSource),
    };
    let mut core = ScreensaverCore::new(store, settings, backends, Some(log_dir))
        .context("Failed to initialize screensaver")?;

    let phase_proxy = Mutex::new(proxy.clone());
    core.controller().set_phase_listener(Arc::new(move |phase| {
        // Loop already gone during shutdown
        let _ = phase_proxy.lock().send_event(UiEvent::PhaseChanged(phase));
    }));

    let menu_proxy = Mutex::new(proxy.clone());
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        let _ = menu_proxy.lock().send_event(UiEvent::Menu(event.id));
    }));

    if let Some(path) = &args.settings_file {
        import_on_startup(&core, path);
    }

    core.start();
    if args.screensaver {
        info!("Starting with the lock screen shown (--screensaver)");
        lock_in_background(core.controller().clone());
    }

    let tray = TrayMenu::build()?;
    let updater = Arc::new(UpdateOrchestrator::new(
        config::manifest_url(),
        config::updater_path()?,
    )?);
    let mut host = SurfaceHost::new();

    info!("Tray icon created, running event loop");

    event_loop.run(move |event, target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::UserEvent(UiEvent::OpenSurface { spec, events, reply }) => {
                host.open_requested(target, spec, events, &reply)
            }
            Event::UserEvent(UiEvent::Surface(id, command)) => host.handle_command(id, command),
            Event::UserEvent(UiEvent::PhaseChanged(phase)) => {
                debug!("Lock phase: {:?}", phase);
                tray.set_locked(phase == LockPhase::Active);
            }
            Event::UserEvent(UiEvent::Menu(id)) => match tray.action_for(&id) {
                Some(TrayAction::LockNow) => lock_in_background(core.controller().clone()),
                Some(TrayAction::ExportSettings) => export_settings(&core),
                Some(TrayAction::CheckForUpdates) => {
                    check_for_updates_in_background(updater.clone(), proxy.clone())
                }
                Some(TrayAction::ShowVersion) => notifications::show_version(CURRENT_VERSION),
                Some(TrayAction::Quit) => {
                    info!("Quit menu item clicked, exiting");
                    core.shutdown();
                    *control_flow = ControlFlow::Exit;
                }
                None => debug!("Unhandled menu event {:?}", id),
            },
            Event::UserEvent(UiEvent::Quit) => {
                info!("Exiting for update");
                core.shutdown();
                *control_flow = ControlFlow::Exit;
            }
            Event::WindowEvent {
                window_id, event, ..
            } => host.handle_window_event(window_id, &event),
            _ => {}
        }
    });
}

/// Import an exported settings file passed on the command line
fn import_on_startup(core: &ScreensaverCore, path: &std::path::Path) {
    if !is_export_file(path) {
        warn!("Ignoring {}: not a .rwapr settings file", path.display());
        return;
    }
    match core.import_settings(path) {
        Ok(_) => {
            info!("Imported settings from {}", path.display());
            notifications::show_settings_imported(path);
        }
        Err(e) => error!("Failed to import settings from {}: {}", path.display(), e),
    }
}

/// Write the current settings to a timestamped `.rwapr` file
fn export_settings(core: &ScreensaverCore) {
    let exported = config::export_dir()
        .and_then(|dir| core.export_settings_to_dir(&dir).map_err(anyhow::Error::from));
    match exported {
        Ok(path) => notifications::show_settings_exported(&path),
        Err(e) => {
            error!("Failed to export settings: {:#}", e);
            notifications::show_export_error(&format!("{:#}", e));
        }
    }
}

/// Activation waits on the event loop to open the window, so it never runs on it
fn lock_in_background(controller: Arc<ScreensaverController>) {
    let spawned = thread::Builder::new()
        .name("lock-now".to_string())
        .spawn(move || {
            if let Err(e) = controller.activate() {
                error!("Failed to show lock screen: {}", e);
            }
        });
    if let Err(e) = spawned {
        error!("Failed to spawn lock thread: {}", e);
    }
}

fn check_for_updates_in_background(updater: Arc<UpdateOrchestrator>, proxy: EventLoopProxy<UiEvent>) {
    let spawned = thread::Builder::new()
        .name("update-check".to_string())
        .spawn(move || {
            if let Err(e) = check_and_install(&updater, &proxy) {
                if let Some(ScreensaverError::UpdateInProgress(phase)) = e.downcast_ref::<ScreensaverError>() {
                    info!("Update check skipped, already {:?}", phase);
                    return;
                }
                error!("Update failed: {:#}", e);
                notifications::show_update_error(&format!("{:#}", e));
            }
        });
    if let Err(e) = spawned {
        error!("Failed to spawn update thread: {}", e);
    }
}

fn check_and_install(updater: &UpdateOrchestrator, proxy: &EventLoopProxy<UiEvent>) -> Result<()> {
    let check = updater.check_for_updates()?;
    notifications::show_update_check(&check);
    if !check.update_available {
        return Ok(());
    }

    let url = check
        .download_url
        .context("Update manifest has no download link")?;
    notifications::show_installing();

    let install_dir = config::install_dir()?;
    let handle = updater.download_and_hand_off(&url, &install_dir, &|progress: DownloadProgress| {
        if let Some(percent) = progress.percent() {
            debug!("Update download {}%", percent);
        }
    })?;
    info!("Updater started (pid {}), exiting", handle.pid());

    // The updater waits for this process before replacing files
    let _ = proxy.send_event(UiEvent::Quit);
    Ok(())
}

/// Fetch one wallpaper per category and report which ones respond
fn run_api_test() -> Result<()> {
    let provider = HttpWallpaperProvider::new()?;
    let mut failures = 0;

    println!("Wallpaper API test");
    println!("==================\n");
    for category in WALLPAPER_CATEGORIES {
        match provider.fetch_url(category) {
            Ok(url) => println!("  OK    {:<10} {}", category, url),
            Err(e) => {
                failures += 1;
                println!("  FAIL  {:<10} {}", category, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!(
            "{} of {} categories failed",
            failures,
            WALLPAPER_CATEGORIES.len()
        );
    }
    println!("\nAll {} categories responded.", WALLPAPER_CATEGORIES.len());
    Ok(())
}
