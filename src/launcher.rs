//! Service launcher: gates on dependencies, then runs exactly one command.
//!
//! One launcher task per service. It blocks in the state store until every
//! declared `(dependency, required_state)` pair has been observed, spawns the
//! command with stdout/stderr redirected to the service's log files, awaits
//! exit, and publishes the terminal state: `completed` on success, `failed`
//! on a non-zero exit or a spawn error.
//!
//! A dependency that reaches `failed` before the required state releases the
//! wait too: the dependent refuses to start and marks itself `failed` instead
//! of blocking forever.

use crate::config::ServiceSpec;
use crate::error::{Error, Result};
use crate::state::{StateStore, STATE_COMPLETED, STATE_FAILED, STATE_START};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::Command;

/// Outcome of the dependency-gating phase.
enum Gate {
    /// Every required state was observed.
    Open,
    /// A dependency failed before reaching the required state.
    Refused { dependency: String, state: String },
}

/// Waits on dependencies and runs one service's command to completion.
pub struct ServiceLauncher {
    name: String,
    spec: ServiceSpec,
    store: Arc<StateStore>,
}

impl ServiceLauncher {
    pub fn new(name: String, spec: ServiceSpec, store: Arc<StateStore>) -> Self {
        Self { name, spec, store }
    }

    /// Gate, spawn, await exit, publish the terminal state. Never retries.
    pub async fn run(self) {
        match self.await_dependencies().await {
            Gate::Open => {}
            Gate::Refused { dependency, state } => {
                tracing::warn!(
                    service = %self.name,
                    %dependency,
                    required = %state,
                    "dependency failed before reaching required state, refusing to start"
                );
                self.store.set_state(&self.name, STATE_FAILED);
                return;
            }
        }

        self.store.set_state(&self.name, STATE_START);
        tracing::info!(service = %self.name, command = %self.spec.command, "starting");

        match self.spawn_and_wait().await {
            Ok(status) if status.success() => {
                tracing::info!(service = %self.name, "completed");
                self.store.set_state(&self.name, STATE_COMPLETED);
            }
            Ok(status) => {
                tracing::error!(service = %self.name, code = ?status.code(), "exited with failure");
                self.store.set_state(&self.name, STATE_FAILED);
            }
            Err(err) => {
                tracing::error!(service = %self.name, %err, "failed to launch");
                self.store.set_state(&self.name, STATE_FAILED);
            }
        }
    }

    /// Block until every dependency's required state was observed.
    ///
    /// Waits are open-ended: a dependency that never reaches its required
    /// state and never terminates blocks this launcher indefinitely. The
    /// wait is released early when the dependency turns `failed`.
    async fn await_dependencies(&self) -> Gate {
        for (dep, required) in &self.spec.dependencies {
            tracing::debug!(
                service = %self.name,
                dependency = %dep,
                required = %required,
                "waiting on dependency"
            );
            self.store
                .wait_until(
                    || {
                        self.store.observed(dep, required)
                            || self.store.current_state(dep).as_deref() == Some(STATE_FAILED)
                    },
                    None,
                )
                .await;

            if !self.store.observed(dep, required) {
                return Gate::Refused {
                    dependency: dep.clone(),
                    state: required.clone(),
                };
            }
        }
        Gate::Open
    }

    /// Spawn `bash -c <command>` with stdout/stderr redirected to the
    /// service's log files (truncated) and await its exit status.
    async fn spawn_and_wait(&self) -> Result<ExitStatus> {
        // Truncate so the watcher and dependents see only this run's output.
        let log = std::fs::File::create(&self.spec.log_file)?;
        let err = std::fs::File::create(&self.spec.error_file)?;

        let mut cmd = Command::new("/bin/bash");
        // The command string comes from the validated config, which is the
        // trust boundary; it is handed to bash unescaped on purpose so that
        // pipelines and quoting inside it keep working.
        cmd.arg("-c")
            .arg(&self.spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err));
        if let Some(dir) = &self.spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            service: self.name.clone(),
            source,
        })?;
        Ok(child.wait().await?)
    }
}
