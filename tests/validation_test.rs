//! Validation errors are fatal and reported before any process is spawned.

use shepherd::{start_services, Config, Error};
use std::time::Instant;

fn config(yaml: &str) -> Config {
    serde_yaml::from_str(yaml).unwrap()
}

#[tokio::test]
async fn missing_command_names_service_and_field() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&format!(
        r#"
        services:
          broker:
            command: ""
            log_file: {dir}/broker.log
            error_file: {dir}/broker.err
        "#,
        dir = dir.path().display(),
    ));

    match start_services(cfg, Instant::now()).await {
        Err(Error::Config { service, field }) => {
            assert_eq!(service, "broker");
            assert_eq!(field, "command");
        }
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_dependency_is_fatal_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran.marker");
    let cfg = config(&format!(
        r#"
        services:
          api:
            command: "touch {marker}"
            log_file: {dir}/api.log
            error_file: {dir}/api.err
            dependencies:
              database: completed
        "#,
        dir = dir.path().display(),
        marker = marker.display(),
    ));

    assert!(matches!(
        start_services(cfg, Instant::now()).await,
        Err(Error::UnknownDependency { .. })
    ));
    assert!(!marker.exists());
}

#[tokio::test]
async fn wait_on_undeclared_state_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&format!(
        r#"
        services:
          db:
            command: "echo up"
            log_file: {dir}/db.log
            error_file: {dir}/db.err
          api:
            command: "echo go"
            log_file: {dir}/api.log
            error_file: {dir}/api.err
            dependencies:
              db: listening
        "#,
        dir = dir.path().display(),
    ));

    match start_services(cfg, Instant::now()).await {
        Err(Error::UnknownState {
            service,
            dependency,
            state,
        }) => {
            assert_eq!(service, "api");
            assert_eq!(dependency, "db");
            assert_eq!(state, "listening");
        }
        other => panic!("expected UnknownState, got {:?}", other),
    }
}
