//! End-to-end run: plan the URLs, capture each page, merge the results.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;

use crate::capture::{self, CaptureOptions, Pacing, RunManifest};
use crate::chrome::{ChromeSession, PrintSettings, SessionOptions};
use crate::cli::Cli;
use crate::{merge, plan};

/// Exit code when the plan is empty.
const EXIT_NO_URLS: u8 = 1;
/// Exit code when no pages were captured, so there is nothing to merge.
const EXIT_NOTHING_CAPTURED: u8 = 2;

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let urls = if let Some(path) = &cli.urls_file {
        plan::from_file(path)?
    } else if let Some(base) = &cli.base_url {
        plan::from_range(base, cli.start_from, cli.start_to, cli.step)?
    } else {
        // clap enforces one of the two sources.
        anyhow::bail!("either --urls-file or --base-url is required");
    };

    if urls.is_empty() {
        eprintln!("No URLs to process.");
        return Ok(ExitCode::from(EXIT_NO_URLS));
    }

    if cli.dry_run {
        for url in &urls {
            println!("{url}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    anyhow::ensure!(
        cli.min_wait <= cli.max_wait,
        "--min-wait ({}) must not exceed --max-wait ({})",
        cli.min_wait,
        cli.max_wait
    );

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating output directory {}", cli.out_dir.display()))?;

    let session = ChromeSession::launch(SessionOptions {
        headful: cli.headful,
        user_data_dir: cli.user_data_dir.clone(),
        browser_path: cli.browser_path.clone(),
    })
    .await
    .context("launching browser")?;

    let opts = CaptureOptions {
        out_dir: cli.out_dir.clone(),
        print: PrintSettings {
            paper_width_in: cli.paper_width_in(),
            margin_in: cli.margin,
            settle: Duration::from_millis(cli.wait_ms),
        },
        pacing: Pacing {
            min_wait_secs: cli.min_wait,
            max_wait_secs: cli.max_wait,
            rest_every: cli.rest_every,
            cooldown: Duration::from_secs(cli.cooldown_sec),
        },
        headful: cli.headful,
        captcha_timeout: Duration::from_secs(cli.captcha_timeout),
    };

    let started_at = Utc::now();
    let records = capture::run(&session, &urls, &opts).await;

    if let Err(err) = session.close().await {
        tracing::warn!(error = %err, "browser did not shut down cleanly");
    }

    if records.is_empty() {
        eprintln!("No PDFs were created; nothing to merge.");
        return Ok(ExitCode::from(EXIT_NOTHING_CAPTURED));
    }

    let manifest = RunManifest {
        started_at,
        finished_at: Utc::now(),
        planned: urls.len(),
        captured: records,
    };
    capture::write_manifest(&cli.out_dir, &manifest)?;

    let inputs: Vec<PathBuf> = manifest
        .captured
        .iter()
        .map(|record| cli.out_dir.join(&record.file))
        .collect();
    let pages = merge::merge_into(&inputs, &cli.merged)?;

    tracing::info!(
        pages,
        merged = %cli.merged.display(),
        "merge complete"
    );
    println!(
        "Done. Merged PDF -> {} ({pages} pages)",
        display_path(&cli.merged)
    );
    println!("Individual PDFs in -> {}", display_path(&cli.out_dir));
    Ok(ExitCode::SUCCESS)
}

fn display_path(path: &std::path::Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
