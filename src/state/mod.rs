//! Shared state store for observed service lifecycle transitions.
//!
//! One process-wide [`StateStore`] holds the current state and transition
//! timestamps of every service. Log watchers write user-defined transitions,
//! launchers write `start` and the terminal `completed`/`failed`, and every
//! launcher waiting on a dependency blocks in [`StateStore::wait_until`]
//! until its predicate holds.
//!
//! # Concurrency
//!
//! The store is a classic monitor: a single synchronous mutex around the
//! state map plus a broadcast wakeup on every mutation. The mutex is
//! `parking_lot` and is never held across an `.await`; the broadcast is a
//! `tokio::sync::Notify`. Waiters register interest with
//! [`tokio::sync::futures::Notified::enable`] *before* evaluating their
//! predicate, so a transition that lands between the check and the await
//! still wakes them — the standard no-missed-wakeup discipline.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// State of a service before anything was observed about it.
pub const STATE_PENDING: &str = "pending";
/// Written by the launcher once all dependencies held and the command spawns.
pub const STATE_START: &str = "start";
/// Terminal state for a process that exited successfully.
pub const STATE_COMPLETED: &str = "completed";
/// Terminal state for a process that could not spawn or exited non-zero.
pub const STATE_FAILED: &str = "failed";

/// Dynamic record for one service.
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// Most recently observed state name.
    pub current: String,
    /// Offset since orchestration start at which each state was first
    /// observed, `None` until then. Keys are in declared order; an entry is
    /// written at most once and never cleared.
    pub times: IndexMap<String, Option<Duration>>,
}

impl ServiceState {
    fn new(declared: impl IntoIterator<Item = String>) -> Self {
        let mut times: IndexMap<String, Option<Duration>> = IndexMap::new();
        times.insert(STATE_START.to_string(), None);
        for state in declared {
            times.entry(state).or_insert(None);
        }
        times.insert(STATE_COMPLETED.to_string(), None);
        Self {
            current: STATE_PENDING.to_string(),
            times,
        }
    }
}

/// Process-wide store of every service's observed lifecycle.
pub struct StateStore {
    services: Mutex<HashMap<String, ServiceState>>,
    changed: Notify,
    started_at: Instant,
}

impl StateStore {
    pub fn new(started_at: Instant) -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            started_at,
        }
    }

    /// Time elapsed since orchestration start.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Create the record for a service, seeding its timestamp slots in
    /// declared order: `start`, the user-defined states, `completed`.
    pub fn register<I, S>(&self, name: &str, declared: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = ServiceState::new(declared.into_iter().map(Into::into));
        self.services.lock().insert(name.to_string(), state);
    }

    /// Record `state` as current for `name` and stamp its first-observed
    /// time if unset. Always broadcasts so every waiter re-evaluates.
    pub fn set_state(&self, name: &str, state: &str) {
        let elapsed = self.elapsed();
        {
            let mut services = self.services.lock();
            let Some(record) = services.get_mut(name) else {
                tracing::warn!(service = name, state, "state set for unknown service");
                return;
            };
            record.current = state.to_string();
            let slot = record.times.entry(state.to_string()).or_insert(None);
            if slot.is_none() {
                *slot = Some(elapsed);
            }
        }
        tracing::debug!(service = name, state, elapsed_s = elapsed.as_secs_f64(), "state transition");
        self.changed.notify_waiters();
    }

    /// Non-blocking snapshot of a service's current state.
    pub fn current_state(&self, name: &str) -> Option<String> {
        self.services.lock().get(name).map(|s| s.current.clone())
    }

    /// When `state` was first observed for `name`, if it has been.
    pub fn state_time(&self, name: &str, state: &str) -> Option<Duration> {
        self.services
            .lock()
            .get(name)
            .and_then(|s| s.times.get(state).copied())
            .flatten()
    }

    /// Whether `state` has ever been observed for `name`. Observation is
    /// sticky: a service advancing past a state does not un-observe it.
    pub fn observed(&self, name: &str, state: &str) -> bool {
        self.state_time(name, state).is_some()
    }

    /// Block until `predicate` holds or the optional timeout elapses.
    /// Returns whether the predicate held.
    ///
    /// The predicate must not block; it is re-evaluated after every store
    /// mutation.
    pub async fn wait_until<F>(&self, mut predicate: F, timeout: Option<Duration>) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking: a set_state between the check and
            // the await still wakes this waiter.
            notified.as_mut().enable();

            if predicate() {
                return true;
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => return predicate(),
                    }
                }
            }
        }
    }

    /// Read-only view of `{service: {state: seconds-since-start}}`, for a
    /// visualization collaborator.
    pub fn snapshot(&self) -> HashMap<String, IndexMap<String, Option<f64>>> {
        self.services
            .lock()
            .iter()
            .map(|(name, state)| {
                let times = state
                    .times
                    .iter()
                    .map(|(s, t)| (s.clone(), t.map(|d| d.as_secs_f64())))
                    .collect();
                (name.clone(), times)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> Arc<StateStore> {
        Arc::new(StateStore::new(Instant::now()))
    }

    #[tokio::test]
    async fn register_seeds_slots_in_declared_order() {
        let store = store();
        store.register("svc", ["booting".to_string(), "ready".to_string()]);
        let snap = store.snapshot();
        let states: Vec<_> = snap["svc"].keys().cloned().collect();
        assert_eq!(states, ["start", "booting", "ready", "completed"]);
        assert!(snap["svc"].values().all(Option::is_none));
        assert_eq!(store.current_state("svc").as_deref(), Some(STATE_PENDING));
    }

    #[tokio::test]
    async fn state_times_are_written_at_most_once() {
        let store = store();
        store.register("svc", ["ready".to_string()]);

        store.set_state("svc", "ready");
        let first = store.state_time("svc", "ready").unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set_state("svc", "ready");
        assert_eq!(store.state_time("svc", "ready"), Some(first));
    }

    #[tokio::test]
    async fn observation_is_sticky_after_advancing() {
        let store = store();
        store.register("svc", ["ready".to_string()]);
        store.set_state("svc", "ready");
        store.set_state("svc", STATE_COMPLETED);
        assert_eq!(store.current_state("svc").as_deref(), Some(STATE_COMPLETED));
        assert!(store.observed("svc", "ready"));
    }

    #[tokio::test]
    async fn wait_until_wakes_on_transition() {
        let store = store();
        store.register("svc", ["ready".to_string()]);

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .wait_until(|| store.observed("svc", "ready"), None)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        store.set_state("svc", "ready");
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn wait_until_times_out_when_predicate_never_holds() {
        let store = store();
        store.register("svc", ["ready".to_string()]);
        let held = store
            .wait_until(
                || store.observed("svc", "ready"),
                Some(Duration::from_millis(50)),
            )
            .await;
        assert!(!held);
    }

    #[tokio::test]
    async fn no_wakeup_is_lost_between_check_and_wait() {
        // Hammer the window: a setter flips states while a waiter blocks on
        // each one in turn. A missed wakeup would hang this test.
        let store = store();
        store.register("svc", (0..50).map(|i| format!("s{i}")));

        let setter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..50 {
                    store.set_state("svc", &format!("s{i}"));
                    tokio::task::yield_now().await;
                }
            })
        };

        for i in 0..50 {
            let name = format!("s{i}");
            let held = store
                .wait_until(
                    || store.observed("svc", &name),
                    Some(Duration::from_secs(5)),
                )
                .await;
            assert!(held, "missed wakeup for {name}");
        }
        setter.await.unwrap();
    }
}
