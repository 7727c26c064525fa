//! Tiered configuration resolution: file, environment, command line

use cep_resolver::config::{CliOverrides, ResolverConfig, ENV_BATCH_CHUNK_SIZE, ENV_TIMEOUT_MS};
use cep_resolver::{CepService, ResolveError};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("cep-resolver.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_over_env_over_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[lookup]
timeout_ms = 1000

[batch]
chunk_size = 3
concurrency_limit = 2

[sources]
order = ["viacep", "brasilapi"]
"#,
    );

    std::env::set_var(ENV_TIMEOUT_MS, "2000");
    std::env::set_var(ENV_BATCH_CHUNK_SIZE, "4");

    let config = ResolverConfig::resolve(
        Some(&path),
        &CliOverrides {
            chunk_size: Some(8),
            ..CliOverrides::default()
        },
    );

    std::env::remove_var(ENV_TIMEOUT_MS);
    std::env::remove_var(ENV_BATCH_CHUNK_SIZE);

    let config = config.unwrap();
    assert_eq!(config.timeout, Duration::from_millis(2000), "env beats file");
    assert_eq!(config.batch.chunk_size, 8, "cli beats env");
    assert_eq!(config.batch.concurrency_limit, 2, "file beats default");
    assert_eq!(config.source_order, vec!["viacep", "brasilapi"]);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ResolverConfig::resolve(Some(&path), &CliOverrides::default()).unwrap_err();
    assert!(matches!(err, ResolveError::Common(_)));
}

#[tokio::test]
#[serial]
async fn test_service_builds_configured_sources_in_order() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[sources]
order = ["widenet", "viacep"]

[sources.base_urls]
viacep = "http://127.0.0.1:9"
"#,
    );

    let config = ResolverConfig::resolve(Some(&path), &CliOverrides::default()).unwrap();
    let service = CepService::from_config(&config).unwrap();

    let names: Vec<String> = service
        .source_health()
        .await
        .into_iter()
        .map(|h| h.source_name)
        .collect();
    assert_eq!(names, vec!["WideNet", "ViaCEP"]);
}
