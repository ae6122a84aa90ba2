//! Live status table of every candidate version.
//!
//! The tracker owns one row per version, in the order it was created with.
//! Each row is an `indicatif` progress bar inside one
//! [`indicatif::MultiProgress`], which redraws the whole block in place,
//! cutting every row to the terminal width. A background ticker advances the
//! spinner of every row together between changes.
//!
//! All state sits behind one async mutex, so each update is applied and drawn
//! as a unit and concurrent attempts can never interleave partial frames.
//!
//! # Output
//!
//! - [`TableOutput::Live`]: redraw on every change and every tick
//! - [`TableOutput::Quiet`]: no ticker, no intermediate frames;
//!   [`ProgressTracker::finish`] prints the final table once. Used when
//!   stderr is not a terminal or progress is disabled.

pub mod render;

use crate::utils::progress::{self, LiveTableGuard};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use semver::Version;
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// State of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStatus {
    Pending,
    /// Running, with the latest progress message
    InProgress(Option<String>),
    Passed,
    /// Finished unsuccessfully, with a reason
    Failed(Option<String>),
}

impl VersionStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed(_))
    }

    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress(_))
    }
}

/// Where the table is drawn.
pub enum TableOutput {
    /// Redrawn in place through `indicatif`
    Live(ProgressDrawTarget),
    /// Written once, when the tracker finishes
    Quiet(Box<dyn Write + Send>),
}

impl TableOutput {
    /// Live on stderr only when stderr is a terminal and progress is not
    /// disabled by flag or environment.
    #[must_use]
    pub fn stderr(no_progress: bool) -> Self {
        if no_progress || progress::progress_disabled_by_env() || !std::io::stderr().is_terminal() {
            Self::Quiet(Box::new(std::io::stderr()))
        } else {
            Self::Live(ProgressDrawTarget::stderr())
        }
    }

    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

struct Ticker {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Row {
    version: Version,
    status: VersionStatus,
    bar: ProgressBar,
}

struct TrackerState {
    rows: Vec<Row>,
    positions: HashMap<Version, usize>,
    version_width: usize,
    table: MultiProgress,
    /// Set for quiet output only
    final_sink: Option<Box<dyn Write + Send>>,
    log_routing: Option<LiveTableGuard>,
    ticker: Option<Ticker>,
    finished: bool,
    in_progress: usize,
    peak_in_progress: usize,
}

impl TrackerState {
    /// Apply `status` to the row of `version`, returning its position when
    /// the row changed.
    fn apply(&mut self, version: &Version, status: VersionStatus) -> Option<usize> {
        let Some(&position) = self.positions.get(version) else {
            tracing::debug!(target: "tracker", "Ignoring update for unknown version {}", version);
            return None;
        };
        let current = &mut self.rows[position].status;
        if current.is_terminal() {
            tracing::debug!(target: "tracker", "Ignoring update for finished version {}", version);
            return None;
        }

        let was_running = current.is_in_progress();
        let now_running = status.is_in_progress();
        *current = status;

        if now_running && !was_running {
            self.in_progress += 1;
            self.peak_in_progress = self.peak_in_progress.max(self.in_progress);
        } else if was_running && !now_running {
            self.in_progress -= 1;
        }
        Some(position)
    }

    fn redraw_row(&self, position: usize) {
        let row = &self.rows[position];
        row.bar.set_message(render::row_message(&row.version, self.version_width, &row.status));
    }

    /// Advance the spinner of every row.
    fn tick(&self) {
        for row in &self.rows {
            row.bar.tick();
        }
    }

    fn write_final_table(&mut self) -> std::io::Result<()> {
        let Some(sink) = self.final_sink.as_mut() else {
            return Ok(());
        };
        let rows: Vec<(Version, VersionStatus)> =
            self.rows.iter().map(|row| (row.version.clone(), row.status.clone())).collect();
        for line in render::final_rows(&rows) {
            writeln!(sink, "{line}")?;
        }
        sink.flush()
    }
}

/// Shared, concurrency-safe status table.
///
/// Cloning is cheap and every clone drives the same table.
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<Mutex<TrackerState>>,
    tick_interval: Duration,
}

impl ProgressTracker {
    /// Create a table with every version `Pending`.
    ///
    /// Row order follows `versions`; repeated versions get a single row.
    pub fn new(versions: impl IntoIterator<Item = Version>, output: TableOutput, tick_interval: Duration) -> Self {
        let mut unique = Vec::new();
        let mut positions = HashMap::new();
        for version in versions {
            if !positions.contains_key(&version) {
                positions.insert(version.clone(), unique.len());
                unique.push(version);
            }
        }

        let (draw_target, final_sink) = match output {
            TableOutput::Live(target) => (target, None),
            TableOutput::Quiet(sink) => (ProgressDrawTarget::hidden(), Some(sink)),
        };
        let table = MultiProgress::with_draw_target(draw_target);
        let version_width = render::version_width(&unique);
        let row_count = unique.len();

        let rows = unique
            .into_iter()
            .enumerate()
            .map(|(index, version)| {
                let status = VersionStatus::Pending;
                let bar = table.add(ProgressBar::hidden());
                bar.set_style(render::row_style());
                let bar = bar
                    .with_prefix(render::index_label(index, row_count))
                    .with_message(render::row_message(&version, version_width, &status));
                // First draw; rows join the block in order
                bar.tick();
                Row {
                    version,
                    status,
                    bar,
                }
            })
            .collect();

        Self {
            state: Arc::new(Mutex::new(TrackerState {
                rows,
                positions,
                version_width,
                table,
                final_sink,
                log_routing: None,
                ticker: None,
                finished: false,
                in_progress: 0,
                peak_in_progress: 0,
            })),
            tick_interval,
        }
    }

    /// Mark `version` running, optionally with a progress message.
    ///
    /// Only the first line of `message` is kept.
    pub async fn mark_in_progress(&self, version: &Version, message: Option<String>) {
        self.update(version, VersionStatus::InProgress(message.and_then(first_line))).await;
    }

    pub async fn mark_passed(&self, version: &Version) {
        self.update(version, VersionStatus::Passed).await;
    }

    pub async fn mark_failed(&self, version: &Version, reason: Option<String>) {
        self.update(version, VersionStatus::Failed(reason.and_then(first_line))).await;
    }

    async fn update(&self, version: &Version, status: VersionStatus) {
        let mut state = self.state.lock().await;
        if let Some(position) = state.apply(version, status) {
            state.redraw_row(position);
        }
    }

    /// Print log output above the live table until [`finish`](Self::finish),
    /// instead of into the rows it redraws. Does nothing for quiet output.
    pub async fn route_logs_above_table(&self) {
        let mut state = self.state.lock().await;
        if !state.finished && !state.table.is_hidden() {
            state.log_routing = Some(progress::register_live_table(&state.table));
        }
    }

    /// Start advancing the spinner. Calling it again while running is a no-op.
    pub async fn start_ticker(&self) {
        let mut state = self.state.lock().await;
        if state.finished || state.table.is_hidden() || state.ticker.is_some() {
            return;
        }

        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(tick(Arc::downgrade(&self.state), self.tick_interval, cancelled));
        state.ticker = Some(Ticker {
            cancel,
            handle,
        });
        tracing::trace!(target: "tracker", "Ticker started ({}ms)", self.tick_interval.as_millis());
    }

    /// Stop the spinner. Nothing is drawn by the ticker once this returns.
    pub async fn stop_ticker(&self) {
        let ticker = {
            let mut state = self.state.lock().await;
            let ticker = state.ticker.take();
            if let Some(ticker) = &ticker {
                let _ = ticker.cancel.send(true);
            }
            ticker
        };

        if let Some(ticker) = ticker {
            if let Err(e) = ticker.handle.await {
                tracing::debug!(target: "tracker", "Ticker task ended abnormally: {}", e);
            }
        }
    }

    /// Stop the ticker and leave the final table on screen, or print it for
    /// quiet output. Later calls do nothing.
    pub async fn finish(&self) {
        self.stop_ticker().await;
        let mut state = self.state.lock().await;
        if state.finished {
            return;
        }
        state.finished = true;

        for row in &state.rows {
            row.bar.abandon();
        }
        state.log_routing = None;
        if let Err(e) = state.write_final_table() {
            tracing::debug!(target: "tracker", "Failed to print status table: {}", e);
        }
        tracing::debug!(target: "tracker", "Peak concurrent attempts: {}", state.peak_in_progress);
    }

    /// Every row, in table order.
    pub async fn snapshot(&self) -> Vec<(Version, VersionStatus)> {
        self.state.lock().await.rows.iter().map(|row| (row.version.clone(), row.status.clone())).collect()
    }

    /// Largest number of rows that were in progress at the same time.
    pub async fn peak_in_progress(&self) -> usize {
        self.state.lock().await.peak_in_progress
    }
}

/// Runs until cancelled or until the tracker it animates is gone.
async fn tick(state: Weak<Mutex<TrackerState>>, period: Duration, mut cancelled: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancelled.changed() => break,
            _ = interval.tick() => {
                let Some(shared) = state.upgrade() else {
                    break;
                };
                let guard = shared.lock().await;
                // Cancellation may have been requested while waiting for the lock
                if *cancelled.borrow() {
                    break;
                }
                guard.tick();
            }
        }
    }
}

/// First line of `message`, keeping only what follows a carriage return.
fn first_line(message: String) -> Option<String> {
    let line = message.lines().next()?;
    let line = line.rsplit('\r').find(|part| !part.trim().is_empty())?.trim();
    (!line.is_empty()).then(|| line.to_string())
}
