pub mod app;
pub mod capture;
pub mod chrome;
pub mod cli;
pub mod merge;
pub mod plan;

pub use capture::{CaptureOptions, PageRecord, Pacing, RunManifest};
pub use chrome::{ChromeError, ChromeSession, PagePrinter, PrintSettings, SessionOptions};
pub use cli::Cli;
pub use merge::MergeError;
pub use plan::PlanError;
