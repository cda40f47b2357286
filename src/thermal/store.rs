use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime};
use parking_lot::RwLock;

use crate::domain::TelemetrySample;
use crate::error::TelemetryError;

/// Append-only, time-ordered log of thermostat samples for one home.
///
/// Samples older than the retention window (relative to the newest sample)
/// age out on append. Readers take snapshots, so ingestion never waits on an
/// optimization run.
pub struct TelemetryStore {
    samples: RwLock<VecDeque<TelemetrySample>>,
    retention: Duration,
}

impl TelemetryStore {
    pub fn new(retention_days: u32) -> Self {
        Self {
            samples: RwLock::new(VecDeque::new()),
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    pub fn append(&self, sample: TelemetrySample) -> Result<(), TelemetryError> {
        let mut q = self.samples.write();
        if let Some(last) = q.back() {
            if sample.timestamp < last.timestamp {
                return Err(TelemetryError::OutOfOrder {
                    last: last.timestamp,
                    got: sample.timestamp,
                });
            }
        }
        let cutoff = sample.timestamp - self.retention;
        q.push_back(sample);

        while q.front().is_some_and(|s| s.timestamp < cutoff) {
            q.pop_front();
        }
        Ok(())
    }

    /// Copy of the samples within `days` before `now` (inclusive).
    pub fn window(&self, now: NaiveDateTime, days: u32) -> Vec<TelemetrySample> {
        let since = now - Duration::days(i64::from(days));
        self.samples
            .read()
            .iter()
            .filter(|s| s.timestamp >= since && s.timestamp <= now)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}
