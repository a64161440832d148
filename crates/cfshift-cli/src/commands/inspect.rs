use super::{json_pretty, load_report, EXIT_SUCCESS};
use cfshift_core::{Config, Outcome};
use cfshift_schema::{AppFingerprint, Application, ProcessType};
use std::path::Path;

pub fn run(manifest: &Path, config: &Config, json: bool) -> Result<u8, String> {
    let report = load_report(manifest, config)?;

    if json {
        let summaries: Vec<_> = report
            .entries
            .iter()
            .filter_map(|e| match &e.outcome {
                Outcome::Normalized {
                    application,
                    fingerprint,
                } => Some(summary_json(application, fingerprint)),
                _ => None,
            })
            .collect();
        println!("{}", json_pretty(&summaries)?);
        return Ok(EXIT_SUCCESS);
    }

    for entry in &report.entries {
        match &entry.outcome {
            Outcome::Normalized {
                application,
                fingerprint,
            } => print_summary(application, fingerprint),
            Outcome::Failed { error, .. } => println!("error:          {error}\n"),
            Outcome::Skipped => {}
        }
    }
    Ok(EXIT_SUCCESS)
}

fn summary_json(app: &Application, fingerprint: &AppFingerprint) -> serde_json::Value {
    serde_json::json!({
        "identity": app.identity(),
        "digest": fingerprint.digest,
        "routes": app.routes.iter().map(|r| format!("{}://{}:{}", r.protocol, r.url, r.port)).collect::<Vec<_>>(),
        "services": app.services.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "processes": app.processes.iter().map(|p| serde_json::json!({
            "name": p.name,
            "type": p.process_type,
            "replicas": app.effective_replicas(p),
        })).collect::<Vec<_>>(),
        "sidecars": app.sidecars.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "startupTimeout": app.startup_timeout,
        "replicas": app.replicas,
    })
}

fn print_summary(app: &Application, fingerprint: &AppFingerprint) {
    println!("application:    {}", app.identity());
    println!("digest:         {}", fingerprint.short_digest);
    println!(
        "stack:          {}",
        if app.stack.is_empty() { "(none)" } else { app.stack.as_str() }
    );
    println!("replicas:       {}", app.replicas);
    println!("startupTimeout: {}s", app.startup_timeout);
    for r in &app.routes {
        println!("route:          {}://{}:{}", r.protocol, r.url, r.port);
    }
    for s in &app.services {
        println!("service:        {}", s.name);
    }
    for p in &app.processes {
        let check = if p.health_check.is_sentinel() {
            "no health check".to_owned()
        } else {
            format!("health {}", p.health_check.endpoint)
        };
        println!(
            "process:        {} ({}) x{}, {check}",
            p.name,
            p.process_type,
            app.effective_replicas(p)
        );
    }
    for s in &app.sidecars {
        let types: Vec<_> = s.process_types.iter().copied().map(ProcessType::as_str).collect();
        println!("sidecar:        {} [{}]", s.name, types.join(", "));
    }
    println!();
}
