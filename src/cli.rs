//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// A4 width in inches.
const A4_WIDTH_IN: f64 = 8.27;
/// US Letter width in inches.
const LETTER_WIDTH_IN: f64 = 8.5;

/// Print webpages to single-page PDFs and merge them into one document.
#[derive(Debug, Clone, Parser)]
#[command(name = "pagebind", version, about)]
pub struct Cli {
    /// Text file with one URL per line
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with = "base_url",
        required_unless_present = "base_url"
    )]
    pub urls_file: Option<PathBuf>,

    /// Base URL containing a 'start=' param or accepting one
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Start value for 'start=' when using --base-url
    #[arg(long, default_value_t = 0)]
    pub start_from: u64,

    /// End value for 'start=' (inclusive) when using --base-url
    #[arg(long, default_value_t = 0)]
    pub start_to: u64,

    /// Step for 'start=' when using --base-url
    #[arg(long, default_value_t = 10)]
    pub step: u64,

    /// Directory for individual PDFs
    #[arg(long, value_name = "DIR", default_value = "pdf_pages")]
    pub out_dir: PathBuf,

    /// Output merged PDF path
    #[arg(long, value_name = "PATH", default_value = "merged.pdf")]
    pub merged: PathBuf,

    /// Use Letter width (8.5in) instead of A4 (8.27in)
    #[arg(long)]
    pub letter: bool,

    /// Margins in inches on all sides
    #[arg(long, default_value_t = 0.4)]
    pub margin: f64,

    /// Extra wait after load before printing (milliseconds)
    #[arg(long, default_value_t = 1500)]
    pub wait_ms: u64,

    /// Run the browser with a visible window (debugging, CAPTCHA solving)
    #[arg(long)]
    pub headful: bool,

    /// Browser user data dir to reuse (keeps cookies, logins)
    #[arg(long, value_name = "DIR")]
    pub user_data_dir: Option<PathBuf>,

    /// Explicit Chrome/Chromium binary (auto-discovered otherwise)
    #[arg(long, value_name = "PATH")]
    pub browser_path: Option<PathBuf>,

    /// After this many pages, rest for a short cooldown
    #[arg(long, default_value_t = 10)]
    pub rest_every: usize,

    /// Cooldown seconds after each burst
    #[arg(long, default_value_t = 1)]
    pub cooldown_sec: u64,

    /// Minimum random wait between pages (seconds)
    #[arg(long, default_value_t = 2.0)]
    pub min_wait: f64,

    /// Maximum random wait between pages (seconds)
    #[arg(long, default_value_t = 5.0)]
    pub max_wait: f64,

    /// Max seconds to wait for a manually solved CAPTCHA in headful mode
    #[arg(long, default_value_t = 600)]
    pub captcha_timeout: u64,

    /// Print the planned URLs and exit without launching a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn paper_width_in(&self) -> f64 {
        if self.letter {
            LETTER_WIDTH_IN
        } else {
            A4_WIDTH_IN
        }
    }
}
