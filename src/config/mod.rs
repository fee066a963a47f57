//! Service configuration types.
//!
//! The orchestrator consumes an already-validated [`Config`] object; it never
//! parses YAML itself. A front end (or a test) deserializes the config with
//! serde and hands it over. Both maps are [`IndexMap`]s because declaration
//! order is semantic: the last entry of `state_keywords` is the terminal
//! log-observed state for its service.

mod validation;

pub use validation::{build_graph, validate};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a single supervised service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Shell-invocable command, passed to `bash -c` verbatim.
    pub command: String,

    /// Working directory for the spawned process. Defaults to the
    /// orchestrator's own working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// File that receives the child's stdout. Tailed by the log watcher.
    pub log_file: PathBuf,

    /// File that receives the child's stderr.
    pub error_file: PathBuf,

    /// Ordered mapping from state name to the literal substring that marks
    /// the transition when it appears in a log line. The last entry is the
    /// terminal log-observed state; once seen, the watcher stops.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub state_keywords: IndexMap<String, String>,

    /// Mapping from another service's name to the state that must have been
    /// observed there before this service may launch.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, String>,
}

impl ServiceSpec {
    /// Name of the last declared log-observed state, if any.
    pub fn terminal_keyword_state(&self) -> Option<&str> {
        self.state_keywords.keys().last().map(String::as_str)
    }
}

/// The full orchestration config: service name to spec, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: IndexMap<String, ServiceSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_keyword_order_is_preserved() {
        let yaml = r#"
            command: "run-broker"
            log_file: broker.log
            error_file: broker.err
            state_keywords:
              booting: "starting up"
              listening: "Listening on"
              drained: "queue drained"
        "#;
        let spec: ServiceSpec = serde_yaml::from_str(yaml).unwrap();
        let states: Vec<_> = spec.state_keywords.keys().cloned().collect();
        assert_eq!(states, ["booting", "listening", "drained"]);
        assert_eq!(spec.terminal_keyword_state(), Some("drained"));
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let yaml = r#"
            command: "echo hi"
            log_file: a.log
            error_file: a.err
        "#;
        let spec: ServiceSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.state_keywords.is_empty());
        assert!(spec.dependencies.is_empty());
        assert!(spec.working_dir.is_none());
        assert_eq!(spec.terminal_keyword_state(), None);
    }

    #[test]
    fn config_maps_names_to_specs() {
        let yaml = r#"
            services:
              db:
                command: "run-db"
                log_file: db.log
                error_file: db.err
              api:
                command: "run-api"
                log_file: api.log
                error_file: api.err
                dependencies:
                  db: completed
        "#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services["api"].dependencies["db"], "completed");
    }
}
