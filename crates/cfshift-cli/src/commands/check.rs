use super::{colorize_status, json_pretty, load_report, EXIT_MANIFEST_ERROR, EXIT_SUCCESS};
use cfshift_core::{Config, Outcome};
use std::path::Path;

pub fn run(manifest: &Path, config: &Config, json: bool) -> Result<u8, String> {
    let report = load_report(manifest, config)?;

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        for entry in &report.entries {
            let name = entry.name.as_deref().unwrap_or("(unnamed)");
            match &entry.outcome {
                Outcome::Normalized { fingerprint, .. } => println!(
                    "{:>8}  {name} ({})",
                    colorize_status("ok"),
                    fingerprint.short_digest
                ),
                Outcome::Failed { error, .. } => {
                    println!("{:>8}  {name}: {error}", colorize_status("failed"));
                }
                Outcome::Skipped => println!("{:>8}  {name}", colorize_status("skipped")),
            }
        }
        let s = report.summary;
        println!(
            "{} application(s): {} ok, {} failed, {} skipped",
            s.total, s.normalized, s.failed, s.skipped
        );
    }

    if report.is_success() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_MANIFEST_ERROR)
    }
}
