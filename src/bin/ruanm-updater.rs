// Ruanm Updater - applies a downloaded update archive to the install directory
// Started by the screensaver with <archive> <install dir>, or run by hand to check

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ruanm_screensaver::config;
use ruanm_screensaver::update::download::DownloadProgress;
use ruanm_screensaver::update::installer::{InstallStage, Installer};
use ruanm_screensaver::update::UpdateOrchestrator;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Out-of-process updater for Ruanm Screensaver
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Out-of-process updater for Ruanm Screensaver",
    long_about = "Replaces the Ruanm Screensaver installation with the contents of an update
archive and relaunches it.

APPLY MODE:
  ruanm-updater <ARCHIVE> <INSTALL_DIR>
    Used by the screensaver after it downloads an update. Waits briefly for
    the screensaver to exit, extracts the archive, copies it over the
    install directory and starts the screensaver again.

CHECK MODE:
  ruanm-updater [--install-dir DIR] [--yes]
    Fetches the update manifest, reports the latest version and, after
    confirmation, downloads and applies it."
)]
struct Args {
    /// Update archive (.zip) to apply
    archive: Option<PathBuf>,

    /// Directory the archive is applied to
    #[arg(value_name = "INSTALL_DIR")]
    target_dir: Option<PathBuf>,

    /// Install directory for check mode (defaults to this executable's directory)
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Install an available update without asking
    #[arg(short, long)]
    yes: bool,
}

fn print_stage(stage: InstallStage) {
    println!("[{:>3}%] {}", stage.percent(), stage.describe());
}

fn print_download(progress: DownloadProgress) {
    match progress {
        DownloadProgress::Determinate { downloaded, total } => {
            print!("\rDownloading... {}% ({} / {} bytes)", progress.percent().unwrap_or(0), downloaded, total);
        }
        DownloadProgress::Indeterminate { downloaded } => {
            print!("\rDownloading... {} bytes", downloaded);
        }
        DownloadProgress::Finished { bytes } => {
            println!("\rDownloaded {} bytes                    ", bytes);
        }
    }
    // Progress line only; a failed flush loses nothing
    let _ = io::stdout().flush();
}

/// Ask a yes/no question, defaulting to no
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn apply(archive: &Path, install_dir: &Path) -> Result<()> {
    info!(
        "Applying {} to {}",
        archive.display(),
        install_dir.display()
    );
    let exe = Installer::new(archive, install_dir)
        .run(&mut print_stage)
        .context("Failed to apply update")?;
    println!("\nUpdate complete, started {}", exe.display());
    Ok(())
}

fn check_and_apply(install_dir: Option<PathBuf>, assume_yes: bool) -> Result<()> {
    let install_dir = match install_dir {
        Some(dir) => dir,
        None => config::install_dir()?,
    };
    let current_exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let orchestrator = UpdateOrchestrator::new(config::manifest_url(), current_exe)?;

    println!("Ruanm Screensaver Updater");
    println!("=========================\n");

    let check = orchestrator
        .check_for_updates()
        .context("Failed to check for updates")?;
    println!("Current version: {}", check.current_version);
    println!("Latest version:  {}", check.latest_version);

    if !check.update_available {
        println!("\nAlready up to date.");
        return Ok(());
    }
    if !check.update_content.is_empty() {
        println!("\nChanges:");
        for line in &check.update_content {
            println!("  - {}", line);
        }
    }
    let url = check
        .download_url
        .context("Update manifest has no download link")?;

    if !assume_yes && !confirm("\nDownload and install now?")? {
        println!("Update skipped.");
        return Ok(());
    }

    let archive = orchestrator
        .download(&url, &print_download)
        .context("Failed to download update")?;
    apply(&archive, &install_dir)
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    match (args.archive, args.target_dir) {
        (Some(archive), Some(target_dir)) => apply(&archive, &target_dir),
        (None, None) => check_and_apply(args.install_dir, args.yes),
        _ => anyhow::bail!(
            "Expected both <ARCHIVE> and <INSTALL_DIR>, or neither to check for updates"
        ),
    }
}
