//! Progress feedback on stderr while a tree is scanned.
//!
//! Progress is off unless requested, and never shown when stderr is not a
//! terminal or `CODE_TAXONOMY_QUIET` is set, so piped reports stay clean.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const TEMPLATE_SCAN: &str = "{spinner} {msg} {pos} files ({per_sec})";

/// Configuration for progress display behavior
#[derive(Debug, Clone, Default)]
pub struct ProgressConfig {
    /// Whether the user asked for progress output
    pub enabled: bool,
    /// Whether to suppress all progress output
    pub quiet_mode: bool,
}

impl ProgressConfig {
    pub fn from_env(enabled: bool) -> Self {
        Self {
            enabled,
            quiet_mode: std::env::var("CODE_TAXONOMY_QUIET").is_ok(),
        }
    }

    pub fn should_show_progress(&self) -> bool {
        if !self.enabled || self.quiet_mode {
            return false;
        }

        use std::io::IsTerminal;
        std::io::stderr().is_terminal()
    }

    /// A file counter spinner, or a hidden bar when progress is off.
    pub fn create_counter(&self, msg: &str) -> ProgressBar {
        if !self.should_show_progress() {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(TEMPLATE_SCAN)
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
