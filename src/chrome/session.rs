use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::chrome::error::ChromeError;

/// Large viewport to reduce reflow surprises while measuring page height.
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 2000;

/// Desktop user agent; Scholar serves a stripped layout to unknown agents.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Chrome's printToPDF assumes 96 CSS pixels per inch.
const CSS_PX_PER_INCH: f64 = 96.0;
const MIN_PAPER_HEIGHT_IN: f64 = 1.0;
const MAX_PAPER_HEIGHT_IN: f64 = 200.0;

/// Full document height in CSS pixels, whichever box reports the largest.
const SCROLL_HEIGHT_JS: &str = "Math.max(\
     document.body.scrollHeight, document.documentElement.scrollHeight,\
     document.body.offsetHeight, document.documentElement.offsetHeight,\
     document.body.clientHeight, document.documentElement.clientHeight)";

/// Containers Scholar uses for its interstitial CAPTCHA (best effort).
const CAPTCHA_SELECTORS: &[&str] = &["#gs_captcha_ccl", "#recaptcha", "form[action*='sorry']"];
const CAPTCHA_POLL: Duration = Duration::from_secs(3);

/// How the browser process is launched.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub headful: bool,
    pub user_data_dir: Option<PathBuf>,
    pub browser_path: Option<PathBuf>,
}

/// How each page is rendered to PDF.
#[derive(Debug, Clone)]
pub struct PrintSettings {
    /// Paper width in inches (A4 or Letter).
    pub paper_width_in: f64,
    /// Margin in inches, applied on all four sides.
    pub margin_in: f64,
    /// Settle time after load, for network idle and lazy content.
    pub settle: Duration,
}

/// What the capture loop needs from a browser session.
///
/// Split out as a trait so pacing, retry, and cooldown behavior can be
/// exercised without a real browser.
#[async_trait]
pub trait PagePrinter: Send + Sync {
    /// Navigate the tab and wait for the load to settle.
    async fn navigate(&self, url: &str, settle: Duration) -> Result<(), ChromeError>;

    /// If a CAPTCHA is on screen, block until it is solved or `timeout`
    /// elapses. Returns true when one was seen, so the caller can reload.
    async fn wait_for_captcha(&self, timeout: Duration) -> Result<bool, ChromeError>;

    /// Print the current page as one tall PDF page and write it to disk.
    async fn print_page(&self, out_path: &Path, print: &PrintSettings)
        -> Result<(), ChromeError>;
}

/// One browser process with a single tab, used serially.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    /// Launch the browser and open a blank tab.
    pub async fn launch(opts: SessionOptions) -> Result<Self, ChromeError> {
        let mut builder = BrowserConfig::builder()
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={USER_AGENT}"));

        if opts.headful {
            builder = builder.with_head();
        }
        if let Some(dir) = &opts.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if let Some(path) = &opts.browser_path {
            builder = builder.chrome_executable(path);
        } else if let Some(found) = discover_binary() {
            tracing::debug!(path = %found.display(), "using discovered browser binary");
            builder = builder.chrome_executable(found);
        }

        let config = builder.build().map_err(ChromeError::LaunchConfig)?;
        let (browser, mut handler) = Browser::launch(config).await?;

        // The handler stream must be polled for the whole session or every
        // CDP call stalls.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "browser handler event");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Paper height that fits the whole document on a single page.
    async fn paper_height_in(&self, margin_in: f64) -> Result<f64, ChromeError> {
        let scroll_px: f64 = self.page.evaluate(SCROLL_HEIGHT_JS).await?.into_value()?;
        let height = scroll_px / CSS_PX_PER_INCH + margin_in * 2.0;
        Ok(height.clamp(MIN_PAPER_HEIGHT_IN, MAX_PAPER_HEIGHT_IN))
    }

    /// Whether a CAPTCHA interstitial is currently on screen.
    pub async fn captcha_visible(&self) -> bool {
        for selector in CAPTCHA_SELECTORS {
            if self.page.find_element(*selector).await.is_ok() {
                return true;
            }
        }
        false
    }

    /// Shut the browser down and reap the process.
    pub async fn close(mut self) -> Result<(), ChromeError> {
        self.browser.close().await?;
        self.browser.wait().await?;
        self.handler_task.abort();
        Ok(())
    }
}

#[async_trait]
impl PagePrinter for ChromeSession {
    async fn navigate(&self, url: &str, settle: Duration) -> Result<(), ChromeError> {
        self.page.goto(url).await?;
        tokio::time::sleep(settle.max(Duration::from_secs(1))).await;
        Ok(())
    }

    async fn print_page(
        &self,
        out_path: &Path,
        print: &PrintSettings,
    ) -> Result<(), ChromeError> {
        // Render with screen styles rather than print styles.
        self.page
            .execute(SetEmulatedMediaParams {
                media: Some("screen".to_string()),
                features: None,
            })
            .await?;

        let paper_height_in = self.paper_height_in(print.margin_in).await?;

        let params = PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(false),
            paper_width: Some(print.paper_width_in),
            paper_height: Some(paper_height_in),
            margin_top: Some(print.margin_in),
            margin_bottom: Some(print.margin_in),
            margin_left: Some(print.margin_in),
            margin_right: Some(print.margin_in),
            display_header_footer: Some(false),
            ..Default::default()
        };

        let bytes = self.page.pdf(params).await?;
        std::fs::write(out_path, &bytes).map_err(|source| ChromeError::WritePdf {
            path: out_path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    async fn wait_for_captcha(&self, timeout: Duration) -> Result<bool, ChromeError> {
        if !self.captcha_visible().await {
            return Ok(false);
        }

        tracing::warn!("CAPTCHA detected; solve it in the browser window");
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(CAPTCHA_POLL).await;
            if !self.captcha_visible().await {
                tracing::info!("CAPTCHA cleared, resuming");
                return Ok(true);
            }
        }

        tracing::warn!(
            timeout_secs = timeout.as_secs(),
            "CAPTCHA not cleared within timeout, continuing anyway"
        );
        Ok(true)
    }
}

fn discover_binary() -> Option<PathBuf> {
    [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ]
    .iter()
    .find_map(|name| which::which(name).ok())
}
