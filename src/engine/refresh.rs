//! Pending writes and the background refresh scheduler.
//!
//! Every successful write enqueues a [`PendingOp`]. An op becomes due once
//! the index's refresh interval has elapsed since it was enqueued; due ops
//! are drained in FIFO order and applied to the searchable state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use crate::document::{ParsedDocument, Source};
use crate::error::Result;
use crate::schema::RefreshInterval;

#[derive(Debug, Clone)]
pub enum PendingAction {
    Upsert {
        version: u64,
        source: Arc<Source>,
        parsed: ParsedDocument,
    },
    Delete,
}

/// A write waiting to become searchable.
#[derive(Debug, Clone)]
pub struct PendingOp {
    pub id: String,
    pub seq_no: u64,
    pub action: PendingAction,
    pub enqueued_at: Instant,
}

impl PendingOp {
    fn is_due(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.enqueued_at) >= interval
    }
}

/// FIFO of pending writes of one index.
#[derive(Debug, Default)]
pub struct RefreshQueue {
    ops: VecDeque<PendingOp>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: PendingOp) {
        self.ops.push_back(op);
    }

    /// Remove the ops that are due at `now`. Nothing is ever due when
    /// automatic refresh is disabled.
    pub fn drain_due(&mut self, now: Instant, interval: RefreshInterval) -> Vec<PendingOp> {
        let RefreshInterval::Every(interval) = interval else {
            return Vec::new();
        };
        let due = self
            .ops
            .iter()
            .take_while(|op| op.is_due(now, interval))
            .count();
        self.ops.drain(..due).collect()
    }

    /// Remove every op regardless of age.
    pub fn drain_all(&mut self) -> Vec<PendingOp> {
        self.ops.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A thread that runs a task every tick until dropped.
#[derive(Debug)]
pub struct RefreshScheduler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn start<F>(tick: Duration, task: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (stop, stopped) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("quarry-refresh".to_string())
            .spawn(move || {
                tracing::debug!("refresh scheduler started, tick {tick:?}");
                loop {
                    match stopped.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => task(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("refresh scheduler stopped");
            })?;
        Ok(RefreshScheduler {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("refresh scheduler thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn op(id: &str, seq_no: u64, enqueued_at: Instant) -> PendingOp {
        PendingOp {
            id: id.to_string(),
            seq_no,
            action: PendingAction::Delete,
            enqueued_at,
        }
    }

    #[test]
    fn test_drain_due_is_fifo_and_time_bound() {
        let start = Instant::now();
        let mut queue = RefreshQueue::new();
        queue.push(op("a", 0, start));
        queue.push(op("b", 1, start + Duration::from_millis(500)));
        queue.push(op("c", 2, start + Duration::from_secs(2)));
        let interval = RefreshInterval::Every(Duration::from_secs(1));

        assert!(queue.drain_due(start, interval).is_empty());
        let due = queue.drain_due(start + Duration::from_millis(1500), interval);
        assert_eq!(due.iter().map(|op| op.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(queue.len(), 1);

        assert!(queue.drain_due(start + Duration::from_secs(60), RefreshInterval::Disabled).is_empty());
        assert_eq!(queue.drain_all().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_scheduler_ticks_until_dropped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let scheduler = RefreshScheduler::start(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while ticks.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        drop(scheduler);
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 2);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }
}
