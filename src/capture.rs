//! Sequential capture loop: pacing, retries, cooldowns, and the run manifest.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::chrome::{ChromeError, PagePrinter, PrintSettings};
use crate::plan;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(3);

pub const MANIFEST_FILE: &str = "manifest.json";

/// Delays between page fetches.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Random wait bounds before each navigation, seconds.
    pub min_wait_secs: f64,
    pub max_wait_secs: f64,
    /// Cooldown after this many pages; 0 disables cooldowns.
    pub rest_every: usize,
    pub cooldown: Duration,
}

impl Pacing {
    /// Human-ish random delay in `[min_wait, max_wait)`.
    fn jitter(&self) -> Duration {
        let secs = if self.max_wait_secs > self.min_wait_secs {
            rand::rng().random_range(self.min_wait_secs..self.max_wait_secs)
        } else {
            self.min_wait_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub out_dir: PathBuf,
    pub print: PrintSettings,
    pub pacing: Pacing,
    /// Headful runs pause for manual CAPTCHA solving.
    pub headful: bool,
    pub captcha_timeout: Duration,
}

/// One captured page, in fetch order.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub index: usize,
    pub url: String,
    pub file: String,
    pub attempts: u32,
    pub captured_at: DateTime<Utc>,
}

/// Record of a whole run, written next to the page PDFs.
#[derive(Debug, Serialize)]
pub struct RunManifest {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub planned: usize,
    pub captured: Vec<PageRecord>,
}

/// Capture every planned URL through one serially-used browser session.
///
/// A page that fails all its attempts is skipped, not fatal; the returned
/// records cover what was actually captured, ordered by fetch order.
pub async fn run(
    session: &impl PagePrinter,
    urls: &[String],
    opts: &CaptureOptions,
) -> Vec<PageRecord> {
    let total = urls.len();
    let mut records = Vec::new();

    for (i, url) in urls.iter().enumerate() {
        let index = i + 1;
        let file = plan::page_file_name(index, url);
        let out_path = opts.out_dir.join(&file);
        tracing::info!("[{index}/{total}] printing -> {file}");

        tokio::time::sleep(opts.pacing.jitter()).await;

        match capture_one(session, url, &out_path, opts).await {
            Ok(attempts) => records.push(PageRecord {
                index,
                url: url.clone(),
                file,
                attempts,
                captured_at: Utc::now(),
            }),
            Err(err) => {
                tracing::error!(url = %url, error = %err, "giving up on page after {MAX_ATTEMPTS} attempts");
            }
        }

        if opts.pacing.rest_every > 0 && index % opts.pacing.rest_every == 0 && index < total {
            tracing::info!(
                seconds = opts.pacing.cooldown.as_secs(),
                "cooling down between bursts"
            );
            tokio::time::sleep(opts.pacing.cooldown).await;
        }
    }

    records
}

/// One URL, up to `MAX_ATTEMPTS` tries with doubling backoff.
/// Returns the attempt count that succeeded.
async fn capture_one(
    session: &impl PagePrinter,
    url: &str,
    out_path: &Path,
    opts: &CaptureOptions,
) -> Result<u32, ChromeError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match try_capture(session, url, out_path, opts).await {
            Ok(()) => return Ok(attempt),
            Err(err) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    url = %url,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    error = %err,
                    "capture attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn try_capture(
    session: &impl PagePrinter,
    url: &str,
    out_path: &Path,
    opts: &CaptureOptions,
) -> Result<(), ChromeError> {
    session.navigate(url, opts.print.settle).await?;

    // In headful mode a human can clear the puzzle; reload afterwards so
    // the real content is on screen before printing.
    if opts.headful && session.wait_for_captcha(opts.captcha_timeout).await? {
        session.navigate(url, opts.print.settle).await?;
    }

    session.print_page(out_path, &opts.print).await
}

/// Write the run manifest into the output directory.
pub fn write_manifest(out_dir: &Path, manifest: &RunManifest) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest).context("serializing run manifest")?;
    std::fs::write(&path, json)
        .with_context(|| format!("writing manifest to {}", path.display()))?;
    Ok(path)
}
