//! Poll-based change detection and cooldown-gated report regeneration.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};

use crate::core::{ChangeSet, FileSnapshot};
use crate::scan::{MarkdownFilter, ScanError};

mod regen;

pub use regen::{InProcessRegenerator, RegenReport, Regenerator, SubprocessRegenerator};

const STOP_POLL_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub cooldown: Duration,
    /// Keep a change that arrived inside the cooldown window pending until
    /// the next cycle outside it, instead of folding it into the snapshot.
    pub retry_skipped: bool,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Unchanged,
    /// Changes were seen but the cooldown window had not elapsed yet.
    Suppressed { changes: ChangeSet },
    Triggered {
        changes: ChangeSet,
        /// True when only a previously suppressed change caused this trigger.
        retried: bool,
        started_at: SystemTime,
        elapsed: Duration,
        result: Result<RegenReport>,
    },
}

impl CycleOutcome {
    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            CycleOutcome::Unchanged => None,
            CycleOutcome::Suppressed { changes } | CycleOutcome::Triggered { changes, .. } => {
                Some(changes)
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self, CycleOutcome::Triggered { .. })
    }
}

/// Loop state: the last snapshot, the time of the last trigger, and
/// whether a suppressed change still waits for regeneration.
pub struct Monitor<R> {
    regenerator: R,
    opts: MonitorOptions,
    previous: FileSnapshot,
    last_execution: Option<Instant>,
    pending: bool,
}

impl<R: Regenerator> Monitor<R> {
    pub fn new(regenerator: R, opts: MonitorOptions, initial: FileSnapshot) -> Self {
        Self {
            regenerator,
            opts,
            previous: initial,
            last_execution: None,
            pending: false,
        }
    }

    pub fn previous_snapshot(&self) -> &FileSnapshot {
        &self.previous
    }

    pub fn last_execution(&self) -> Option<Instant> {
        self.last_execution
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    pub fn regenerator(&self) -> &R {
        &self.regenerator
    }

    /// Runs one EVALUATING step against a freshly scanned snapshot.
    ///
    /// The snapshot always replaces the previous one, whether or not the
    /// cooldown lets the regeneration through.
    pub fn cycle(&mut self, current: FileSnapshot, now: Instant) -> CycleOutcome {
        let changes = FileSnapshot::diff(&self.previous, &current);
        self.previous = current;

        let retried = !changes.is_changed() && self.pending;
        if !changes.is_changed() && !retried {
            return CycleOutcome::Unchanged;
        }

        if !self.cooldown_elapsed(now) {
            if self.opts.retry_skipped {
                self.pending = true;
            }
            return CycleOutcome::Suppressed { changes };
        }

        self.pending = false;
        self.last_execution = Some(now);

        let started_at = SystemTime::now();
        let started = Instant::now();
        let result = self.regenerator.regenerate();

        CycleOutcome::Triggered {
            changes,
            retried,
            started_at,
            elapsed: started.elapsed(),
            result,
        }
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_execution {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.opts.cooldown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub root: PathBuf,
    pub filter: MarkdownFilter,
    pub poll_interval: Duration,
}

pub enum WatchEvent<'a> {
    ScanErrors(&'a [ScanError]),
    Cycle(&'a CycleOutcome),
}

/// IDLE -> POLLING -> EVALUATING (-> TRIGGERING) until `stop` is raised.
///
/// A scan that fails as a whole (root gone, root unreadable) ends the loop
/// with that error; per-file scan failures are only reported.
pub fn run<R: Regenerator>(
    monitor: &mut Monitor<R>,
    opts: &WatchOptions,
    stop: &AtomicBool,
    mut on_event: impl FnMut(WatchEvent<'_>),
) -> Result<()> {
    loop {
        if !sleep_unless_stopped(opts.poll_interval, stop) {
            return Ok(());
        }

        let scan = crate::scan::snapshot(&opts.root, &opts.filter)
            .with_context(|| format!("scanning {}", opts.root.display()))?;
        if !scan.errors.is_empty() {
            on_event(WatchEvent::ScanErrors(&scan.errors));
        }

        let outcome = monitor.cycle(scan.snapshot, Instant::now());
        on_event(WatchEvent::Cycle(&outcome));

        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
    }
}

/// Sleeps for `total`, waking early when `stop` is raised. Returns false if stopped.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        std::thread::sleep(left.min(STOP_POLL_SLICE));
    }
}
