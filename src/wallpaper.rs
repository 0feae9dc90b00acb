//! Network wallpaper provider
//!
//! The API answers `GET <endpoint>?category=<c>&type=json` with
//! `{"url": "..."}`. Requests are retried with a linear backoff that stops
//! early when the owning timer is cancelled.

use crate::constants::{
    RANDOM_KEYWORD, WALLPAPER_API_URL, WALLPAPER_CATEGORIES, WALLPAPER_MAX_ATTEMPTS,
    WALLPAPER_REQUEST_TIMEOUT_SECS, WALLPAPER_RETRY_STEP_SECS,
};
use crate::error::{Result, ScreensaverError};
use crate::timer::Cancellation;
use log::{debug, warn};
use rand::seq::IndexedRandom;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

/// Resolves a wallpaper category to an image URL
pub trait WallpaperProvider: Send + Sync {
    fn fetch_url(&self, category: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct WallpaperResponse {
    #[serde(default)]
    url: Option<String>,
}

pub struct HttpWallpaperProvider {
    client: Client,
    endpoint: String,
}

impl HttpWallpaperProvider {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(WALLPAPER_API_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WALLPAPER_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl WallpaperProvider for HttpWallpaperProvider {
    fn fetch_url(&self, category: &str) -> Result<String> {
        debug!("Requesting wallpaper: category={}", category);
        let response: WallpaperResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("category", category), ("type", "json")])
            .send()?
            .error_for_status()?
            .json()?;

        match response.url {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(ScreensaverError::Network(format!(
                "wallpaper API returned no url for category '{}'",
                category
            ))),
        }
    }
}

/// Map the configured keyword to a concrete category
///
/// `"random"` (and a blank keyword) samples one of the known categories.
pub fn resolve_category(keyword: &str) -> String {
    let keyword = keyword.trim();
    if keyword.is_empty() || keyword == RANDOM_KEYWORD {
        let picked = WALLPAPER_CATEGORIES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(WALLPAPER_CATEGORIES[0]);
        debug!("Random wallpaper category: {}", picked);
        return picked.to_string();
    }
    keyword.to_string()
}

/// Attempt count and backoff step for provider requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: WALLPAPER_MAX_ATTEMPTS,
            step: Duration::from_secs(WALLPAPER_RETRY_STEP_SECS),
        }
    }
}

/// Ask the provider for a URL, retrying with `step * attempt` waits
///
/// Returns None when every attempt failed or the wait was cancelled.
pub fn fetch_with_retry(
    provider: &dyn WallpaperProvider,
    keyword: &str,
    retry: RetryPolicy,
    cancellation: &Cancellation,
) -> Option<String> {
    let category = resolve_category(keyword);
    let attempts = retry.attempts.max(1);

    for attempt in 1..=attempts {
        match provider.fetch_url(&category) {
            Ok(url) => return Some(url),
            Err(e) => {
                warn!(
                    "Failed to fetch wallpaper (attempt {}/{}): {}",
                    attempt, attempts, e
                );
                if attempt < attempts && !cancellation.sleep(retry.step * attempt) {
                    debug!("Wallpaper retry cancelled");
                    return None;
                }
            }
        }
    }
    None
}
