//! CLI progress display utilities
//!
//! Step indicators with emojis, and spinners for the long phases.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

// =============================================================================
// Emoji Constants (with ASCII fallbacks for terminals without emoji support)
// =============================================================================

/// Magnifying glass - for scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("\u{1f50d} ", "");
/// Link - for dependency resolution
pub static LINK: Emoji<'_, '_> = Emoji("\u{1f517} ", "");
/// Floppy disk - for writing the index cache
pub static DISK: Emoji<'_, '_> = Emoji("\u{1f4be} ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("\u{2728} ", "");

// =============================================================================
// Step-Based Progress
// =============================================================================

/// Print a step indicator: `[1/2] 🔍 Message...`
///
/// # Example
/// ```ignore
/// print_step(1, 2, LOOKING_GLASS, "Indexing plugins...");
/// print_step(2, 2, LINK, "Tracking dependencies...");
/// ```
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    eprintln!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    eprintln!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

// =============================================================================
// Simple Progress Helpers
// =============================================================================

/// Create a spinner that ticks on its own until finished.
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn simple_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
