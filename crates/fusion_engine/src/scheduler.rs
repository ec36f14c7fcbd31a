//! Synchronization window scheduler.
//!
//! Windows are fixed-period slices of the alignment clock:
//! `[n * period, (n + 1) * period)` with `window_id = n`. Per-window state
//! machine: `Open -> Closing -> Emitted | Discarded`. A window closes when
//! every expected sensor's watermark has passed its end, or when `max_wait`
//! has elapsed since its start (bounded latency, partial data allowed).

use std::collections::VecDeque;

use contracts::Nanos;

/// Window lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Collecting readings
    Open,
    /// Ready for assembly
    Closing,
    /// A batch has been produced
    Emitted,
    /// Released without emission (shutdown only)
    Discarded,
}

/// One alignment-clock window.
///
/// Holds only indices into the time axis; readings stay owned by the ingest
/// buffers until eviction.
#[derive(Debug, Clone)]
pub struct SyncWindow {
    /// Window index (monotonically increasing across the run)
    pub window_id: u64,
    /// Start of the interval (inclusive)
    pub start: Nanos,
    /// End of the interval (exclusive)
    pub end: Nanos,
    /// Whether the close was forced by `max_wait`
    pub timed_out: bool,
    state: WindowState,
}

impl SyncWindow {
    /// Target timestamp for reading selection: `start + period / 2`.
    #[inline]
    pub fn center(&self) -> Nanos {
        self.start + (self.end - self.start) / 2
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WindowState {
        self.state
    }

    pub(crate) fn mark(&mut self, state: WindowState) {
        self.state = state;
    }
}

/// Advances the window set as readings and time arrive.
#[derive(Debug)]
pub struct WindowScheduler {
    period: Nanos,
    max_wait: Nanos,
    /// Open windows in ascending id order
    windows: VecDeque<SyncWindow>,
    highest_opened: Option<u64>,
    last_emitted: Option<u64>,
    emitted_total: u64,
    discarded_total: u64,
}

impl WindowScheduler {
    /// Create a scheduler for the given period and close timeout.
    pub fn new(period: Nanos, max_wait: Nanos) -> Self {
        Self {
            period,
            max_wait,
            windows: VecDeque::new(),
            highest_opened: None,
            last_emitted: None,
            emitted_total: 0,
            discarded_total: 0,
        }
    }

    /// Note a normalized timestamp; opens the covering window if it is beyond
    /// every previously opened one.
    ///
    /// Ids may skip forward after source gaps; emission order stays strictly
    /// increasing either way.
    pub fn observe(&mut self, normalized_ts: Nanos) {
        if normalized_ts < 0 {
            return;
        }
        let id = (normalized_ts / self.period) as u64;
        if self.highest_opened.is_some_and(|h| id <= h) {
            return;
        }

        let start = id as Nanos * self.period;
        self.windows.push_back(SyncWindow {
            window_id: id,
            start,
            end: start + self.period,
            timed_out: false,
            state: WindowState::Open,
        });
        self.highest_opened = Some(id);

        tracing::trace!(window_id = id, start, "window opened");
        metrics::counter!("fusion_windows_opened_total").increment(1);
    }

    /// Close and hand out windows that are ready for assembly, in id order.
    ///
    /// `watermarks_past(end)` must return true when every expected sensor's
    /// buffer watermark has advanced past `end`.
    pub fn take_ready<F>(&mut self, now: Nanos, watermarks_past: F) -> Vec<SyncWindow>
    where
        F: Fn(Nanos) -> bool,
    {
        for window in &mut self.windows {
            if window.state != WindowState::Open {
                continue;
            }
            if watermarks_past(window.end) {
                window.mark(WindowState::Closing);
            } else if now >= window.start + self.max_wait {
                window.timed_out = true;
                window.mark(WindowState::Closing);
                metrics::counter!("fusion_windows_timed_out_total").increment(1);
            }
        }

        // Emit from the front only: an open front window blocks later ones so
        // batches leave in strictly increasing window_id order.
        let mut ready = Vec::new();
        while self
            .windows
            .front()
            .is_some_and(|w| w.state == WindowState::Closing)
        {
            if let Some(window) = self.windows.pop_front() {
                ready.push(window);
            }
        }
        ready
    }

    /// Record that the assembler produced a batch for `window_id`.
    pub fn note_emitted(&mut self, window_id: u64) {
        debug_assert!(self.last_emitted.is_none_or(|last| window_id > last));
        self.last_emitted = Some(window_id);
        self.emitted_total += 1;
    }

    /// Release all remaining windows without emission (shutdown).
    pub fn discard_open(&mut self) -> usize {
        let count = self.windows.len();
        for mut window in self.windows.drain(..) {
            window.mark(WindowState::Discarded);
        }
        self.discarded_total += count as u64;
        count
    }

    /// Earliest `start + max_wait` across open windows.
    ///
    /// The runtime sleeps until this deadline or the next reading, whichever
    /// comes first.
    pub fn next_deadline(&self) -> Option<Nanos> {
        self.windows
            .iter()
            .filter(|w| w.state == WindowState::Open)
            .map(|w| w.start + self.max_wait)
            .min()
    }

    /// Number of currently open windows.
    pub fn open_count(&self) -> usize {
        self.windows.len()
    }

    /// Total windows emitted so far.
    pub fn emitted_total(&self) -> u64 {
        self.emitted_total
    }

    /// Total windows discarded at shutdown.
    pub fn discarded_total(&self) -> u64 {
        self.discarded_total
    }
}
