//! Website commands: `open <url>` and `browse <url>`.

use super::{CommandRegistry, handler};
use crate::error::{AssistantError, Result};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Reply when the browser could not be launched.
pub const OPEN_FAILED: &str =
    "I couldn't open that website. Please check the URL and try again.";

/// Launches URLs in a browser.
pub trait UrlOpener: Send + Sync {
    /// Open `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser could not be launched.
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the platform's default opener program.
///
/// The opener is launched and left running; only a failed launch is an
/// error. Its exit status is collected on a background thread.
#[derive(Debug, Clone)]
pub struct SystemOpener {
    program: String,
    args: Vec<String>,
}

impl SystemOpener {
    /// Use `program` with leading `args`; the URL is appended last.
    pub fn with_program(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
        }
    }
}

impl Default for SystemOpener {
    #[cfg(target_os = "macos")]
    fn default() -> Self {
        Self::with_program("open", &[])
    }

    #[cfg(target_os = "windows")]
    fn default() -> Self {
        Self::with_program("cmd", &["/C", "start", ""])
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn default() -> Self {
        Self::with_program("xdg-open", &[])
    }
}

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                AssistantError::Browser(format!("failed to launch {}: {e}", self.program))
            })?;

        let program = self.program.clone();
        let reaper = std::thread::Builder::new()
            .name("jarvis-opener".to_owned())
            .spawn(move || match child.wait() {
                Ok(status) if !status.success() => {
                    tracing::warn!(program = %program, %status, "browser opener failed");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(program = %program, "failed to wait for opener: {e}"),
            });
        if let Err(e) = reaper {
            tracing::warn!("failed to spawn opener reaper thread: {e}");
        }
        Ok(())
    }
}

/// Prepend `https://` unless the address already names http(s).
#[must_use]
pub fn normalize_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_owned()
    } else {
        format!("https://{address}")
    }
}

/// Open `address` and describe the outcome.
pub fn open_website(opener: &dyn UrlOpener, address: &str) -> String {
    let url = normalize_url(address);
    match opener.open(&url) {
        Ok(()) => format!("Opening {url}"),
        Err(e) => {
            tracing::error!(url = %url, error = %e, "error opening website");
            OPEN_FAILED.to_owned()
        }
    }
}

/// Register `open` and `browse`.
pub fn register(registry: &mut CommandRegistry, opener: Arc<dyn UrlOpener>) {
    for name in ["open", "browse"] {
        let opener = Arc::clone(&opener);
        registry.register(
            name,
            handler(move |args| Ok(open_website(opener.as_ref(), args))),
        );
    }
    tracing::info!("web browser commands registered");
}
