use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Service '{service}' is missing required field '{field}'")]
    #[diagnostic(
        code(shepherd::config::missing_field),
        help("Every service needs a non-empty command, log_file and error_file")
    )]
    Config { service: String, field: String },

    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    #[diagnostic(
        code(shepherd::config::unknown_dependency),
        help("Check the dependency map of '{service}' against the configured service names")
    )]
    UnknownDependency { service: String, dependency: String },

    #[error(
        "Service '{service}' waits for state '{state}' that service '{dependency}' never reaches"
    )]
    #[diagnostic(
        code(shepherd::config::unknown_state),
        help("'{dependency}' must declare '{state}' in its state_keywords, or use 'completed'/'failed'")
    )]
    UnknownState {
        service: String,
        dependency: String,
        state: String,
    },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    #[diagnostic(
        code(shepherd::dependency::circular),
        help("Services cannot depend on each other in a cycle. Review the dependency maps")
    )]
    CircularDependency(Vec<String>),

    #[error("Service '{service}' failed to spawn: {source}")]
    #[diagnostic(
        code(shepherd::process::spawn),
        help("Check that the command exists and is executable")
    )]
    Spawn {
        service: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
