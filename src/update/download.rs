//! Streaming archive download with progress

use crate::constants::DOWNLOAD_CHUNK_BYTES;
use crate::error::{Result, ScreensaverError};
use log::debug;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProgress {
    /// Content-Length known
    Determinate { downloaded: u64, total: u64 },
    Indeterminate { downloaded: u64 },
    Finished { bytes: u64 },
}

impl DownloadProgress {
    /// 0-100 when the total is known
    pub fn percent(&self) -> Option<u8> {
        match *self {
            DownloadProgress::Determinate { downloaded, total } if total > 0 => {
                Some((downloaded.saturating_mul(100) / total).min(100) as u8)
            }
            DownloadProgress::Finished { .. } => Some(100),
            _ => None,
        }
    }
}

/// Receives download progress; closures and channels both work
pub trait ProgressSink {
    fn report(&self, progress: DownloadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(DownloadProgress),
{
    fn report(&self, progress: DownloadProgress) {
        self(progress)
    }
}

impl ProgressSink for Sender<DownloadProgress> {
    fn report(&self, progress: DownloadProgress) {
        // Receiver gone means nobody is watching; keep downloading
        let _ = self.send(progress);
    }
}

/// Stream `url` into `dest`, returning the byte count
///
/// A partial file is removed on failure.
pub fn download_to(client: &Client, url: &str, dest: &Path, sink: &dyn ProgressSink) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let result = stream(client, url, dest, sink);
    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

fn stream(client: &Client, url: &str, dest: &Path, sink: &dyn ProgressSink) -> Result<u64> {
    debug!("Downloading {} -> {}", url, dest.display());
    let mut response = client.get(url).send()?.error_for_status()?;
    let total = response.content_length().filter(|len| *len > 0);

    let mut writer = BufWriter::new(File::create(dest)?);
    let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
    let mut downloaded = 0u64;

    loop {
        let read = response
            .read(&mut buf)
            .map_err(|e| ScreensaverError::Network(format!("download interrupted: {}", e)))?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
        downloaded += read as u64;

        sink.report(match total {
            Some(total) => DownloadProgress::Determinate { downloaded, total },
            None => DownloadProgress::Indeterminate { downloaded },
        });
    }
    writer.flush()?;

    if let Some(total) = total {
        if downloaded < total {
            return Err(ScreensaverError::Network(format!(
                "download truncated: {} of {} bytes",
                downloaded, total
            )));
        }
    }

    sink.report(DownloadProgress::Finished { bytes: downloaded });
    Ok(downloaded)
}
