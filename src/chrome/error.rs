use thiserror::Error;

/// Error type for browser session operations.
#[derive(Debug, Error)]
pub enum ChromeError {
    /// Browser launch configuration was rejected.
    #[error("failed to configure browser launch: {0}")]
    LaunchConfig(String),

    /// DevTools protocol call failed.
    #[error("devtools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// A page script returned something other than the expected shape.
    #[error("unexpected result from page script: {0}")]
    Script(#[from] serde_json::Error),

    /// Writing a captured PDF to disk failed.
    #[error("failed to write {path}: {source}")]
    WritePdf {
        path: String,
        source: std::io::Error,
    },

    /// The browser process did not shut down cleanly.
    #[error("browser did not shut down cleanly: {0}")]
    Shutdown(#[from] std::io::Error),
}
