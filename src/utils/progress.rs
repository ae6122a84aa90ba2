//! Spinners, shared spinner glyphs, and log output that stays clear of the
//! live status table.
//!
//! The per-version status table lives in [`crate::tracker`]; this module
//! wraps an `indicatif` spinner for the steps before it. The spinner is hidden
//! when `RANGE_PROBE_NO_PROGRESS` is set or when explicitly disabled.
//!
//! While a table is live, log events are written through
//! [`indicatif::MultiProgress::suspend`] so they land above the table instead
//! of inside the region it redraws. See [`ProgressAwareStderr`].

use crate::constants::NO_PROGRESS_ENV_VAR;
use indicatif::{MultiProgress, ProgressBar as IndicatifBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// Spinner glyphs, one per animation frame.
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// The animation frames followed by the glyph shown once finished, in the
/// shape `ProgressStyle::tick_strings` expects.
#[must_use]
pub fn tick_strings(finished: &'static str) -> Vec<&'static str> {
    let mut ticks = SPINNER_FRAMES.to_vec();
    ticks.push(finished);
    ticks
}

/// Whether `RANGE_PROBE_NO_PROGRESS` turns progress output off.
#[must_use]
pub fn progress_disabled_by_env() -> bool {
    std::env::var_os(NO_PROGRESS_ENV_VAR).is_some_and(|v| !v.is_empty())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&tick_strings("✓"))
}

/// A spinner drawn on stderr.
#[derive(Clone)]
pub struct Spinner {
    inner: IndicatifBar,
}

impl Spinner {
    /// Start a spinner showing `msg`; hidden when `disabled` or progress is
    /// turned off in the environment.
    pub fn start(msg: impl Into<String>, disabled: bool) -> Self {
        let bar = if disabled || progress_disabled_by_env() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_message(msg.into());
        Self {
            inner: bar,
        }
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

static LIVE_TABLE: Mutex<Option<(u64, MultiProgress)>> = Mutex::new(None);
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Keeps a table registered for log routing; unregisters it on drop.
#[derive(Debug)]
pub struct LiveTableGuard {
    id: u64,
}

impl Drop for LiveTableGuard {
    fn drop(&mut self) {
        let mut slot = LIVE_TABLE.lock().unwrap_or_else(PoisonError::into_inner);
        // A newer table may have taken the slot
        if slot.as_ref().is_some_and(|(id, _)| *id == self.id) {
            *slot = None;
        }
    }
}

/// Route log output around `table` until the returned guard is dropped.
///
/// Only one table is live at a time; registering another replaces it.
#[must_use]
pub fn register_live_table(table: &MultiProgress) -> LiveTableGuard {
    let id = NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed);
    *LIVE_TABLE.lock().unwrap_or_else(PoisonError::into_inner) = Some((id, table.clone()));
    LiveTableGuard {
        id,
    }
}

/// Whether a table is currently registered.
#[must_use]
pub fn live_table_registered() -> bool {
    LIVE_TABLE.lock().unwrap_or_else(PoisonError::into_inner).is_some()
}

/// Write `bytes` to `out`, hiding the registered table, if any, while doing so.
pub fn write_above_live_table(bytes: &[u8], out: &mut dyn Write) -> io::Result<()> {
    let table = LIVE_TABLE.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|(_, table)| table.clone());

    match table {
        Some(table) => table.suspend(|| {
            out.write_all(bytes)?;
            out.flush()
        }),
        None => {
            out.write_all(bytes)?;
            out.flush()
        }
    }
}

/// `tracing-subscriber` writer for stderr that cooperates with the live
/// status table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAwareStderr;

impl<'a> MakeWriter<'a> for ProgressAwareStderr {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter {
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event and emits it in a single write on drop.
#[derive(Debug)]
pub struct EventWriter {
    buf: Vec<u8>,
}

impl Write for EventWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            let _ = write_above_live_table(&self.buf, &mut io::stderr().lock());
        }
    }
}
