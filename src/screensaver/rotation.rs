//! Wallpaper choice for each rotation tick

use crate::settings::Settings;
use crate::timer::Cancellation;
use crate::wallpaper::{fetch_with_retry, RetryPolicy, WallpaperProvider};
use log::debug;
use rand::seq::IndexedRandom;
use std::path::PathBuf;

/// A wallpaper pushed to the lock surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wallpaper {
    LocalFile(PathBuf),
    Url(String),
}

/// Pick the next wallpaper
///
/// A non-empty local list wins and the provider is never consulted;
/// otherwise the provider resolves `wallpaperKeyword`.
pub fn next_wallpaper(
    settings: &Settings,
    provider: &dyn WallpaperProvider,
    retry: RetryPolicy,
    cancellation: &Cancellation,
) -> Option<Wallpaper> {
    let local = settings.local_wallpaper_paths();
    if let Some(path) = local.choose(&mut rand::rng()) {
        debug!("Using local wallpaper: {}", path);
        return Some(Wallpaper::LocalFile(PathBuf::from(path)));
    }

    fetch_with_retry(provider, &settings.wallpaper_keyword, retry, cancellation).map(Wallpaper::Url)
}
