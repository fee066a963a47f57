//! Config validation, run before any process is spawned.
//!
//! Validation is fatal: a config that refers to an unknown service, waits on
//! a state its dependency never reaches, or omits a required field aborts
//! orchestration entirely.

use super::Config;
use crate::dependency::Graph;
use crate::error::{Error, Result};
use crate::state::{STATE_COMPLETED, STATE_FAILED};

/// Check every service for required fields and resolvable dependencies.
pub fn validate(config: &Config) -> Result<()> {
    for (name, spec) in &config.services {
        for (field, empty) in [
            ("command", spec.command.trim().is_empty()),
            ("log_file", spec.log_file.as_os_str().is_empty()),
            ("error_file", spec.error_file.as_os_str().is_empty()),
        ] {
            if empty {
                return Err(Error::Config {
                    service: name.clone(),
                    field: field.to_string(),
                });
            }
        }

        for (dep_name, required_state) in &spec.dependencies {
            let Some(dep) = config.services.get(dep_name) else {
                return Err(Error::UnknownDependency {
                    service: name.clone(),
                    dependency: dep_name.clone(),
                });
            };

            // A wait on a state the dependency can never reach would block
            // the launcher forever; reject it up front. The launcher itself
            // publishes `completed`/`failed`, so those are always reachable.
            let reachable = required_state == STATE_COMPLETED
                || required_state == STATE_FAILED
                || dep.state_keywords.contains_key(required_state);
            if !reachable {
                return Err(Error::UnknownState {
                    service: name.clone(),
                    dependency: dep_name.clone(),
                    state: required_state.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Build the dependency graph for cycle detection and the diagnostic
/// topological order.
pub fn build_graph(config: &Config) -> Graph {
    let mut graph = Graph::new();
    for (name, spec) in &config.services {
        graph.add_service(name.clone());
        for dep_name in spec.dependencies.keys() {
            graph.add_dependency(name.clone(), dep_name.clone());
        }
    }
    graph
}
