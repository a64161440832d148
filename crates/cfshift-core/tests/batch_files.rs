//! File-based batch tests: manifests written to disk, normalized through
//! `normalize_file`, and written back out with `write_atomic`.

use cfshift_core::{normalize_file, write_atomic, Config, CoreError, Outcome};
use cfshift_schema::{normalize_application, parse_manifest_file, NormalizeOptions};
use std::fs;

const MANIFEST: &str = r"---
version: 1
applications:
- name: catalog
  instances: 2
  routes:
  - route: catalog.example.com
  services:
  - catalog-db
  processes:
  - type: web
    healthCheck:
      endpoint: /health
- name: importer
  processes:
  - command: ./import --loop
    livenessProbe: /ping
    livenessProbeTimeout: 10
";

#[test]
fn normalizes_manifest_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.yml");
    fs::write(&path, MANIFEST).unwrap();

    let report = normalize_file(&path, &Config::default()).unwrap();
    assert!(report.is_success());
    assert_eq!(report.summary.normalized, 2);
    assert_eq!(report.source.as_deref(), Some(path.display().to_string().as_str()));

    let apps: Vec<_> = report.applications().collect();
    assert_eq!(apps[0].replicas, 2);
    assert_eq!(apps[0].startup_timeout, 60);
    assert_eq!(apps[1].processes[0].health_check.interval, 10);
}

#[test]
fn written_output_reloads_as_identical_applications() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("manifest.yml");
    fs::write(&manifest, MANIFEST).unwrap();

    let report = normalize_file(&manifest, &Config::default()).unwrap();
    let apps: Vec<_> = report.applications().cloned().collect();
    let out = dir.path().join("canonical.json");
    write_atomic(&out, serde_json::to_string_pretty(&apps).unwrap().as_bytes()).unwrap();

    let reloaded = parse_manifest_file(&out).unwrap();
    let again = reloaded.normalize_all(&NormalizeOptions::default()).unwrap();
    assert_eq!(again, apps);

    let single = normalize_application(&reloaded.applications[1], &NormalizeOptions::default())
        .unwrap();
    assert_eq!(single, apps[1]);
}

#[test]
fn missing_manifest_is_manifest_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = normalize_file(&dir.path().join("nope.yml"), &Config::default());
    assert!(matches!(result, Err(CoreError::Manifest(_))));
}

#[test]
fn one_bad_application_does_not_hide_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.yml");
    fs::write(
        &path,
        "applications:\n- name: ok\n- name: bad\n  sidecars: [{name: s, command: x}]\n",
    )
    .unwrap();

    let report = normalize_file(&path, &Config::default()).unwrap();
    assert_eq!(report.summary.normalized, 1);
    assert_eq!(report.summary.failed, 1);
    assert!(matches!(
        report.entries[1].outcome,
        Outcome::Failed { ref kind, .. } if kind == "missing_required_field"
    ));
}
