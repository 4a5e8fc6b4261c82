//! Bounded buffer of per-call timing records.

use arc_swap::ArcSwapOption;
use jmxlink_protocol::InternalStat;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{FetchError, FetchResult};

/// Capacity used when the configured size is below 1.
pub const DEFAULT_MAX_SIZE: usize = 100_000;

/// FIFO of the most recent stats, oldest evicted first.
#[derive(Debug)]
pub struct InternalStats {
    capacity: usize,
    buffer: Mutex<VecDeque<Arc<Mutex<InternalStat>>>>,
}

impl InternalStats {
    /// Create a buffer holding at most `max_size` records.
    pub fn new(max_size: i64) -> Self {
        let capacity = usize::try_from(max_size)
            .ok()
            .filter(|&n| n >= 1)
            .unwrap_or(DEFAULT_MAX_SIZE);
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether nothing has been recorded since the last drain.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Start a record of `stat_type`; the returned handle fills it in.
    pub fn record(&self, stat_type: &str) -> StatHandle {
        let stat = Arc::new(Mutex::new(InternalStat {
            stat_type: stat_type.to_string(),
            mbean: String::new(),
            attrs: Vec::new(),
            response_count: 0,
            milliseconds: 0.0,
            start_timestamp: chrono::Utc::now().timestamp_millis(),
            successful: false,
        }));

        {
            let mut buffer = self.buffer.lock();
            while buffer.len() >= self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(Arc::clone(&stat));
        }

        StatHandle {
            inner: Some((stat, Instant::now())),
        }
    }

    /// Take every retained record, oldest first.
    pub fn drain(&self) -> Vec<InternalStat> {
        let drained: Vec<_> = self.buffer.lock().drain(..).collect();
        drained.iter().map(|stat| stat.lock().clone()).collect()
    }
}

/// Handle on one in-flight record; a no-op when stats are disabled.
#[derive(Debug, Default)]
pub struct StatHandle {
    inner: Option<(Arc<Mutex<InternalStat>>, Instant)>,
}

impl StatHandle {
    /// Handle that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut InternalStat)) {
        if let Some((stat, _)) = &self.inner {
            f(&mut stat.lock());
        }
    }

    /// Bean name or pattern the call targets.
    pub fn set_mbean(&self, mbean: &str) {
        self.update(|s| s.mbean = mbean.to_string());
    }

    /// Attributes the call requests.
    pub fn set_attrs(&self, attrs: &[String]) {
        self.update(|s| s.attrs = attrs.to_vec());
    }

    /// Number of values the call returned.
    pub fn set_response_count(&self, count: usize) {
        self.update(|s| s.response_count = count as u64);
    }

    /// Mark the call successful.
    pub fn set_successful(&self) {
        self.update(|s| s.successful = true);
    }

    /// Stamp the elapsed time.
    pub fn finish(self) {
        if let Some((stat, started)) = self.inner {
            stat.lock().milliseconds = started.elapsed().as_secs_f64() * 1000.0;
        }
    }
}

/// Stats recorder swapped on every connect.
#[derive(Debug, Clone, Default)]
pub struct SharedStats(Arc<ArcSwapOption<InternalStats>>);

impl SharedStats {
    /// Install a fresh buffer when `enabled`, otherwise turn recording off.
    pub fn configure(&self, enabled: bool, max_size: i64) {
        let next = enabled.then(|| Arc::new(InternalStats::new(max_size)));
        self.0.store(next);
    }

    /// Start a record, or a no-op handle when disabled.
    pub fn record(&self, stat_type: &str) -> StatHandle {
        match self.0.load().as_ref() {
            Some(stats) => stats.record(stat_type),
            None => StatHandle::disabled(),
        }
    }

    /// Take every retained record.
    ///
    /// # Errors
    ///
    /// Fails when recording is not enabled.
    pub fn drain(&self) -> FetchResult<Vec<InternalStat>> {
        match self.0.load().as_ref() {
            Some(stats) => Ok(stats.drain()),
            None => Err(FetchError::operation("internal stats not activated")),
        }
    }
}
