//! Chromium session driven over the DevTools protocol.

pub mod error;
pub mod session;

pub use error::ChromeError;
pub use session::{ChromeSession, PagePrinter, PrintSettings, SessionOptions};
