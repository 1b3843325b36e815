//! Test fixtures and sample data

use chrono::{DateTime, TimeZone, Utc};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Midnight, 1 January 2024
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A snapshot directory shaped like the database's backup output
pub fn write_snapshot(dir: &Path) -> Vec<PathBuf> {
    fs::create_dir_all(dir).expect("Failed to create snapshot dir");
    let files = vec![
        (dir.join("20240101T000000Z.manifest"), b"{\"kv\":{}}".to_vec()),
        (dir.join("20240101T000000Z.bolt.gz"), vec![0x1f, 0x8b, 0x08, 0x00]),
        (dir.join("20240101T000000Z.s1.tar.gz"), vec![0x1f, 0x8b, 0x08, 0x00, 0x01]),
    ];
    for (path, contents) in &files {
        fs::write(path, contents).expect("Failed to write snapshot file");
    }
    files.into_iter().map(|(path, _)| path).collect()
}

/// Entry paths in a tar archive
pub fn tar_entries(archive: &Path) -> Vec<String> {
    let file = File::open(archive).expect("Failed to open archive");
    let mut archive = tar::Archive::new(file);
    archive
        .entries()
        .expect("Failed to read archive")
        .map(|entry| {
            entry
                .expect("Bad archive entry")
                .path()
                .expect("Bad entry path")
                .display()
                .to_string()
        })
        .collect()
}

/// Artifact-like names present directly under `root`
pub fn staged_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| !name.starts_with('.'))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Minimal TOML for an embedded deployment
pub fn minimal_config_toml() -> &'static str {
    r#"
[backup]
interval_seconds = 60
staging_path = "{staging}"
"#
}

/// TOML for an external deployment uploading to S3
pub fn external_s3_config_toml() -> &'static str {
    r#"
[backup]
interval_seconds = 900
retention_seconds = 604800
staging_path = "{staging}"
organization = "plant"
bucket = "sensors"

[services]
mode = "external"
database_unit = "influxdb"

[storage]
type = "s3"
bucket = "plant-backups"
region = "eu-west-1"

[readiness]
max_attempts = 30
backoff = "exponential"
"#
}

/// Fill `{staging}` in a template
pub fn render_template(template: &str, staging: &Path) -> String {
    template.replace("{staging}", &staging.display().to_string())
}
