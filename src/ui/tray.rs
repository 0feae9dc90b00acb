//! System tray icon and menu

use crate::constants::{CURRENT_VERSION, TRAY_ICON_SIZE};
use anyhow::{Context, Result};
use log::error;
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const IDLE_COLOR: [u8; 4] = [46, 139, 87, 255];
const LOCKED_COLOR: [u8; 4] = [178, 34, 34, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    LockNow,
    ExportSettings,
    CheckForUpdates,
    ShowVersion,
    Quit,
}

pub struct TrayMenu {
    tray: TrayIcon,
    lock_item: MenuItem,
    export_item: MenuItem,
    update_item: MenuItem,
    version_item: MenuItem,
    quit_item: MenuItem,
}

impl TrayMenu {
    pub fn build() -> Result<Self> {
        let lock_item = MenuItem::new("Lock Now", true, None);
        let export_item = MenuItem::new("Export Settings", true, None);
        let update_item = MenuItem::new("Check for Updates", true, None);
        let separator = PredefinedMenuItem::separator();
        let version_item = MenuItem::new(format!("Version {}", CURRENT_VERSION), true, None);
        let quit_item = MenuItem::new("Quit", true, None);

        let menu = Menu::new();
        menu.append(&lock_item).context("Failed to add lock menu item")?;
        menu.append(&export_item).context("Failed to add export menu item")?;
        menu.append(&update_item).context("Failed to add update menu item")?;
        menu.append(&separator).context("Failed to add separator")?;
        menu.append(&version_item).context("Failed to add version menu item")?;
        menu.append(&quit_item).context("Failed to add quit menu item")?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("Ruanm Screensaver")
            .with_icon(lock_icon(false)?)
            .build()
            .context("Failed to create tray icon")?;

        Ok(Self {
            tray,
            lock_item,
            export_item,
            update_item,
            version_item,
            quit_item,
        })
    }

    pub fn action_for(&self, id: &MenuId) -> Option<TrayAction> {
        if id == self.lock_item.id() {
            Some(TrayAction::LockNow)
        } else if id == self.export_item.id() {
            Some(TrayAction::ExportSettings)
        } else if id == self.update_item.id() {
            Some(TrayAction::CheckForUpdates)
        } else if id == self.version_item.id() {
            Some(TrayAction::ShowVersion)
        } else if id == self.quit_item.id() {
            Some(TrayAction::Quit)
        } else {
            None
        }
    }

    /// Reflect the lock state in the icon, tooltip and menu
    pub fn set_locked(&self, locked: bool) {
        match lock_icon(locked) {
            Ok(icon) => {
                if let Err(e) = self.tray.set_icon(Some(icon)) {
                    error!("Failed to update tray icon: {}", e);
                }
            }
            Err(e) => error!("Failed to build tray icon: {:#}", e),
        }
        let tooltip = if locked {
            "Ruanm Screensaver - locked"
        } else {
            "Ruanm Screensaver"
        };
        if let Err(e) = self.tray.set_tooltip(Some(tooltip)) {
            error!("Failed to update tray tooltip: {}", e);
        }
        self.lock_item.set_enabled(!locked);
    }
}

/// Solid square icon: green when idle, red while locked
pub fn lock_icon(locked: bool) -> Result<Icon> {
    let color = if locked { LOCKED_COLOR } else { IDLE_COLOR };
    Icon::from_rgba(icon_rgba(color, TRAY_ICON_SIZE), TRAY_ICON_SIZE, TRAY_ICON_SIZE)
        .context("Failed to create tray icon image")
}

fn icon_rgba(color: [u8; 4], size: u32) -> Vec<u8> {
    color
        .iter()
        .copied()
        .cycle()
        .take((size * size * 4) as usize)
        .collect()
}
