use super::{json_pretty, load_report, EXIT_SUCCESS};
use cfshift_core::{write_atomic, Config, Outcome};
use cfshift_schema::Application;
use std::path::Path;

pub fn run(
    manifest: &Path,
    output: Option<&Path>,
    config: &Config,
    json: bool,
) -> Result<u8, String> {
    let report = load_report(manifest, config)?;

    if !report.is_success() {
        for entry in &report.entries {
            if let Outcome::Failed { error, .. } = &entry.outcome {
                eprintln!("  {error}");
            }
        }
        return Err(format!(
            "manifest error: {} of {} application(s) failed to normalize",
            report.summary.failed, report.summary.total
        ));
    }

    let applications: Vec<&Application> = report.applications().collect();
    let rendered = json_pretty(&applications)?;

    match output {
        Some(path) => {
            write_atomic(path, format!("{rendered}\n").as_bytes()).map_err(|e| e.to_string())?;
            if json {
                let payload = serde_json::json!({
                    "output": path.display().to_string(),
                    "applications": applications.len(),
                    "status": "normalized"
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                println!(
                    "wrote {} application(s) to {}",
                    applications.len(),
                    path.display()
                );
            }
        }
        None => println!("{rendered}"),
    }
    Ok(EXIT_SUCCESS)
}
