//! Composition root: validates the config and drives the 2N tasks.
//!
//! For N services the orchestrator spawns N log watchers and N launchers on
//! the tokio runtime, then blocks until every launcher terminated. Watchers
//! are stopped afterwards through one process-wide
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and joined, so
//! a watcher whose service never produced its terminal keyword cannot hang
//! shutdown.

use crate::config::{self, Config};
use crate::error::Result;
use crate::launcher::ServiceLauncher;
use crate::state::StateStore;
use crate::watcher::LogWatcher;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// The supervisor for one orchestration run.
///
/// Construction validates the config (required fields, resolvable
/// dependencies, acyclicity); nothing is spawned until [`Orchestrator::run`].
///
/// # Example
///
/// ```no_run
/// use shepherd::{Config, Orchestrator};
///
/// # async fn example() -> Result<(), shepherd::Error> {
/// let config = Config::default(); // produced by a config front end
/// let orchestrator = Orchestrator::new(config)?;
/// orchestrator.run().await;
/// let times = orchestrator.snapshot();
/// # let _ = times;
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    config: Config,
    store: Arc<StateStore>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Validate `config` and prepare a run clocked from "now".
    pub fn new(config: Config) -> Result<Self> {
        Self::with_start_time(config, Instant::now())
    }

    /// Validate `config` and prepare a run whose state timestamps are
    /// offsets from `start_time`.
    pub fn with_start_time(config: Config, start_time: Instant) -> Result<Self> {
        config::validate(&config)?;
        let order = config::build_graph(&config).topological_sort()?;
        // Diagnostic only: runtime order is decided by state observation.
        tracing::debug!(?order, "static dependency order");

        Ok(Self {
            config,
            store: Arc::new(StateStore::new(start_time)),
            cancel: CancellationToken::new(),
        })
    }

    /// The shared state store for this run.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Read-only `{service: {state: seconds-since-start}}` view.
    pub fn snapshot(&self) -> HashMap<String, IndexMap<String, Option<f64>>> {
        self.store.snapshot()
    }

    /// Start every service's watcher and launcher, block until all
    /// launchers terminated, then stop and join the watchers.
    pub async fn run(&self) {
        let mut watchers = Vec::with_capacity(self.config.services.len());
        let mut launchers = Vec::with_capacity(self.config.services.len());

        for (name, spec) in &self.config.services {
            self.store
                .register(name, spec.state_keywords.keys().map(String::as_str));

            let watcher = LogWatcher::new(
                name.clone(),
                spec,
                Arc::clone(&self.store),
                self.cancel.child_token(),
            );
            watchers.push(tokio::spawn(watcher.run()));

            let launcher =
                ServiceLauncher::new(name.clone(), spec.clone(), Arc::clone(&self.store));
            launchers.push(tokio::spawn(launcher.run()));
        }
        tracing::info!(services = self.config.services.len(), "orchestration started");

        for handle in launchers {
            if let Err(err) = handle.await {
                tracing::error!(%err, "launcher task panicked");
            }
        }

        tracing::debug!("all launchers finished, stopping log watchers");
        self.cancel.cancel();
        for handle in watchers {
            if let Err(err) = handle.await {
                tracing::error!(%err, "watcher task panicked");
            }
        }
        tracing::info!("orchestration complete");
    }
}

/// Validate `config`, run every service to termination, and return.
///
/// State timestamps are recorded as offsets from `start_time`. Validation
/// errors abort before any process is spawned; per-service runtime failures
/// surface as `failed` states in the store and as error logs, not as an
/// `Err` from this function.
pub async fn start_services(config: Config, start_time: Instant) -> Result<()> {
    let orchestrator = Orchestrator::with_start_time(config, start_time)?;
    orchestrator.run().await;
    Ok(())
}
