//! Final artifacts
//!
//! Only reached after the sequencer lands in `Done`; a run that fails
//! earlier produces neither the screenshot nor the summary block.

use crate::config::{HarnessConfig, PART_MARKER, SUMMARY_CAP};
use crate::console::{ConsoleEntry, ConsoleLog};
use crate::driver::PageDriver;
use crate::error::HarnessError;

/// Screenshot the final page state and print the filtered console summary.
pub async fn capture(
    driver: &PageDriver<'_>,
    console: &ConsoleLog,
    config: &HarnessConfig,
) -> Result<(), HarnessError> {
    driver.screenshot(&config.screenshot_path).await?;
    println!("\nScreenshot saved to {}", config.screenshot_path);
    print!("{}", format_summary(&console.filter(PART_MARKER, SUMMARY_CAP)));
    Ok(())
}

fn format_summary(entries: &[ConsoleEntry]) -> String {
    let mut out = String::from("\n=== Console Summary ===\n");
    for entry in entries {
        out.push_str(&format!("[{}] {}\n", entry.level, entry.text));
    }
    out
}
