use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Start and end of one workload, as offsets from the run epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: Duration,
    pub end: Duration,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSlot {
    pub workload_name: String,
    pub interval: Interval,
}

#[derive(Debug)]
struct RecorderInner {
    epoch: Instant,
    slots: Vec<Mutex<Option<TimingSlot>>>,
}

/// Monotonic timing for one run.
///
/// The recorder fixes the run epoch when it is created and owns one slot per execution unit. Each
/// slot has its own lock, so units running on different threads never write to shared state.
#[derive(Debug, Clone)]
pub struct TimingRecorder {
    inner: Arc<RecorderInner>,
}

impl TimingRecorder {
    pub fn new(slot_count: usize) -> Self {
        Self {
            inner: Arc::new(RecorderInner {
                epoch: Instant::now(),
                slots: (0..slot_count).map(|_| Mutex::new(None)).collect(),
            }),
        }
    }

    #[cfg(test)]
    fn epoch(&self) -> Instant {
        self.inner.epoch
    }

    /// Convert an instant to an offset from the epoch. Instants before the epoch map to zero.
    pub fn offset(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.inner.epoch)
    }

    /// Start timing the workload in `slot`. The interval is stored when the handle is finished or
    /// dropped.
    pub fn record(&self, slot: usize, workload_name: &str) -> TimingHandle {
        TimingHandle {
            recorder: self.clone(),
            slot,
            workload_name: workload_name.to_string(),
            started: Instant::now(),
            stored: false,
        }
    }

    /// Store timestamps that were captured somewhere else, for example when a message from a
    /// worker process arrived.
    pub fn store(
        &self,
        slot: usize,
        workload_name: &str,
        start: Instant,
        end: Instant,
    ) -> Interval {
        let interval = Interval {
            start: self.offset(start),
            end: self.offset(end.max(start)),
        };

        match self.inner.slots.get(slot) {
            Some(cell) => {
                *cell.lock() = Some(TimingSlot {
                    workload_name: workload_name.to_string(),
                    interval,
                });
            }
            None => log::error!(
                "Timing slot {slot} for '{workload_name}' is out of range, the recorder has {} slots",
                self.inner.slots.len()
            ),
        }

        interval
    }

    pub fn interval(&self, slot: usize) -> Option<Interval> {
        self.inner
            .slots
            .get(slot)
            .and_then(|cell| cell.lock().as_ref().map(|s| s.interval))
    }

    /// Copy of every slot, in slot order.
    #[cfg(test)]
    fn snapshot(&self) -> Vec<Option<TimingSlot>> {
        self.inner
            .slots
            .iter()
            .map(|cell| cell.lock().clone())
            .collect()
    }
}

/// Scoped timing for one workload. Stores its interval into the recorder slot on release.
#[derive(Debug)]
pub struct TimingHandle {
    recorder: TimingRecorder,
    slot: usize,
    workload_name: String,
    started: Instant,
    stored: bool,
}

impl TimingHandle {
    /// Stop timing now and return the stored interval.
    pub fn finish(mut self) -> Interval {
        self.store_now()
    }

    fn store_now(&mut self) -> Interval {
        self.stored = true;
        self.recorder
            .store(self.slot, &self.workload_name, self.started, Instant::now())
    }
}

impl Drop for TimingHandle {
    fn drop(&mut self) {
        if !self.stored {
            self.store_now();
        }
    }
}
