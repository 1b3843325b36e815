//! Unit tests for the metrics agent configuration

use test_utils::{ConfigBuilder, TestContext};
use tsguard::services::agent_config::{write_agent_config, IGNORED_FILESYSTEMS};
use tsguard::services::{render_agent_config, AgentTarget};

fn rendered_for(token: &str) -> toml::Table {
    let config = ConfigBuilder::new()
        .with_org_and_bucket("plant", "sensors")
        .build();
    let target = AgentTarget::from_config(&config.services, &config.backup);
    toml::from_str(&render_agent_config(&target.with_token(token)).unwrap()).unwrap()
}

#[test]
fn test_output_uses_job_identity() {
    let table = rendered_for("Tok3nXyZ");
    let output = &table["outputs"]["influxdb_v2"].as_array().unwrap()[0];
    assert_eq!(output["token"].as_str(), Some("Tok3nXyZ"));
    assert_eq!(output["organization"].as_str(), Some("plant"));
    assert_eq!(output["bucket"].as_str(), Some("sensors"));
}

#[test]
fn test_every_ignored_filesystem_listed() {
    let table = rendered_for("t");
    let ignored = table["inputs"]["disk"].as_array().unwrap()[0]["ignore_fs"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(ignored, IGNORED_FILESYSTEMS.len());
}

#[test]
fn test_agent_timing() {
    let table = rendered_for("t");
    let agent = table["agent"].as_table().unwrap();
    assert_eq!(agent["round_interval"].as_bool(), Some(true));
    assert_eq!(agent["flush_jitter"].as_str(), Some("0s"));
    assert_eq!(agent["omit_hostname"].as_bool(), Some(false));
}

#[tokio::test]
async fn test_rewrite_replaces_token() {
    let ctx = TestContext::new();
    let path = ctx.temp_dir().join("telegraf.conf");
    let target = AgentTarget {
        urls: vec!["http://127.0.0.1:8086".to_string()],
        organization: "o".to_string(),
        bucket: "b".to_string(),
    };

    write_agent_config(&path, &target.with_token("first111")).await.unwrap();
    write_agent_config(&path, &target.with_token("second22")).await.unwrap();

    let contents = ctx.read_file("telegraf.conf").unwrap();
    assert!(contents.contains("second22"));
    assert!(!contents.contains("first111"));
}
