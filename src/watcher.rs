//! Log watcher: turns a service's free-text log into state transitions.
//!
//! One watcher task tails one service's log file, `tail -f` style. Each
//! complete line is tested against the service's declared state keywords in
//! declaration order; the first substring match publishes that state to the
//! [`StateStore`](crate::state::StateStore). The watcher stops once the last
//! declared state was observed or the process-wide cancellation fires.

use crate::config::ServiceSpec;
use crate::state::StateStore;
use indexmap::IndexMap;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;

/// How long to sleep between existence polls and end-of-file polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tails one service's log file and publishes keyword-matched transitions.
pub struct LogWatcher {
    name: String,
    log_file: PathBuf,
    /// State name to detection substring, in declaration order.
    keywords: IndexMap<String, String>,
    store: Arc<StateStore>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl LogWatcher {
    pub fn new(
        name: String,
        spec: &ServiceSpec,
        store: Arc<StateStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            log_file: spec.log_file.clone(),
            keywords: spec.state_keywords.clone(),
            store,
            cancel,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until the last declared state was observed or cancellation fires.
    ///
    /// A service with no state keywords has nothing to watch: dependents
    /// must gate on `completed`, which the launcher publishes.
    pub async fn run(self) {
        let Some(last_state) = self.keywords.keys().last().cloned() else {
            tracing::debug!(service = %self.name, "no state keywords, watcher idle");
            return;
        };

        if !self.wait_for_file().await {
            return;
        }
        tracing::debug!(service = %self.name, log = %self.log_file.display(), "tailing log");

        let mut offset: u64 = 0;
        let mut reader: Option<BufReader<File>> = None;
        let mut line = String::new();

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            if reader.is_none() {
                match self.open_at(&mut offset).await {
                    Ok(r) => reader = Some(r),
                    Err(err) => {
                        // Rotated or briefly missing file: keep polling.
                        tracing::debug!(service = %self.name, %err, "log reopen failed, retrying");
                        if !self.pause().await {
                            return;
                        }
                        continue;
                    }
                }
            }
            let Some(r) = reader.as_mut() else { continue };

            match r.read_line(&mut line).await {
                // End of file for now; wait for the child to write more.
                Ok(0) => {
                    if !self.pause().await {
                        return;
                    }
                }
                Ok(n) => {
                    offset += n as u64;
                    // A line without a trailing newline is still being
                    // written; leave it in the buffer and let the next read
                    // append the rest.
                    if !line.ends_with('\n') {
                        continue;
                    }
                    if let Some(state) = self.match_line(&line) {
                        let state = state.to_string();
                        self.store.set_state(&self.name, &state);
                        if state == last_state {
                            tracing::debug!(service = %self.name, %state, "terminal keyword observed, watcher done");
                            return;
                        }
                    }
                    line.clear();
                }
                Err(err) => {
                    tracing::debug!(service = %self.name, %err, "log read failed, reopening");
                    reader = None;
                    line.clear();
                    if !self.pause().await {
                        return;
                    }
                }
            }
        }
    }

    /// First substring match in declaration order, if any.
    fn match_line(&self, line: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(_, keyword)| line.contains(keyword.as_str()))
            .map(|(state, _)| state.as_str())
    }

    /// Poll until the log file exists. Returns false on cancellation, so
    /// watchers for services that never start don't block shutdown.
    async fn wait_for_file(&self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if tokio::fs::try_exists(&self.log_file).await.unwrap_or(false) {
                return true;
            }
            if !self.pause().await {
                return false;
            }
        }
    }

    /// Open the log and seek forward to `offset`. If the file shrank
    /// (rotation/truncation), fall back to the start of the new content.
    async fn open_at(&self, offset: &mut u64) -> std::io::Result<BufReader<File>> {
        let mut file = File::open(&self.log_file).await?;
        let len = file.metadata().await?.len();
        if len < *offset {
            tracing::debug!(service = %self.name, "log file shrank, restarting tail");
            *offset = 0;
        }
        file.seek(SeekFrom::Start(*offset)).await?;
        Ok(BufReader::new(file))
    }

    /// Sleep one poll interval; returns false if cancellation fired first.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}
