//! # Shepherd
//!
//! A dependency-gated service orchestrator: it starts a set of named
//! programs in an order determined not by static sequencing but by runtime
//! conditions observed in each program's own log output.
//!
//! ## Features
//!
//! - **Log-observed readiness**: a service declares named lifecycle states
//!   as literal substrings of its log lines; dependents wait for a state to
//!   be observed, not for the process to exit
//! - **Dependency gating**: each service lists `(service, required_state)`
//!   pairs that must hold before it launches
//! - **Cycle detection**: cyclic configurations are rejected before any
//!   process is spawned
//! - **Failure propagation**: a service that cannot spawn or exits non-zero
//!   turns `failed`; dependents blocked on it are released and refuse to
//!   start instead of deadlocking
//! - **Timing capture**: every first observation of a state is stamped with
//!   its offset from orchestration start, exposed as a read-only snapshot
//!
//! ## Quick start
//!
//! ```no_run
//! use shepherd::{start_services, Config};
//! use std::time::Instant;
//!
//! # async fn example() -> Result<(), shepherd::Error> {
//! // A config front end (YAML loader, test fixture, ...) produces `Config`;
//! // the orchestrator itself never parses config files.
//! let config = Config::default();
//! start_services(config, Instant::now()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency model
//!
//! For N services the orchestrator runs 2N tokio tasks: one log watcher
//! tailing each service's log file and one launcher gating on dependencies
//! and running the command. The only shared mutable structure is the
//! [`StateStore`], a single-mutex monitor whose broadcast wakes every waiter
//! on every transition; waiters re-check their predicate after each wake, so
//! no transition is missed. Watchers honor a process-wide cancellation
//! token at their poll points; launchers block without timeout on their
//! dependency waits (released early only when a dependency fails).

pub mod config;
pub mod dependency;
pub mod error;
pub mod launcher;
pub mod orchestrator;
pub mod state;
pub mod watcher;

pub use config::{Config, ServiceSpec};
pub use error::{Error, Result};
pub use launcher::ServiceLauncher;
pub use orchestrator::{start_services, Orchestrator};
pub use state::{StateStore, STATE_COMPLETED, STATE_FAILED, STATE_PENDING, STATE_START};
pub use watcher::LogWatcher;
