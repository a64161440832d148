pub mod check;
pub mod completions;
pub mod inspect;
pub mod man_pages;
pub mod normalize;

use cfshift_core::{normalize_file, BatchReport, Config};
use std::path::Path;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load_report(manifest: &Path, config: &Config) -> Result<BatchReport, String> {
    normalize_file(manifest, config).map_err(|e| e.to_string())
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "ok" => Style::new().green().apply_to(status).to_string(),
        "failed" => Style::new().red().bold().apply_to(status).to_string(),
        "skipped" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}
