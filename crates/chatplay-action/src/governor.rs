//! Admission control: bounded concurrency plus a minimum dispatch interval.
//!
//! Rejected triggers are dropped, never queued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chatplay_core::EngineConfig;

use crate::error::Rejection;

/// Decides whether a new task may start.
///
/// The in-flight counter is shared with every [`AdmissionTicket`]; a ticket
/// gives its slot back when dropped, whichever thread drops it.
#[derive(Debug)]
pub struct Governor {
    max_concurrent: usize,
    min_interval: Duration,
    in_flight: Arc<AtomicUsize>,
    last_accepted: Mutex<Option<Instant>>,
}

impl Governor {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            max_concurrent,
            min_interval,
            in_flight: Arc::new(AtomicUsize::new(0)),
            last_accepted: Mutex::new(None),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_concurrent_tasks, config.min_dispatch_interval())
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Tasks currently holding a ticket.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Admit a task now.
    pub fn try_admit(&self) -> Result<AdmissionTicket, Rejection> {
        self.try_admit_at(Instant::now())
    }

    /// Admit a task at `now`. Concurrency is checked before the rate floor.
    pub fn try_admit_at(&self, now: Instant) -> Result<AdmissionTicket, Rejection> {
        let in_flight = self.in_flight();
        if in_flight >= self.max_concurrent {
            return Err(Rejection::Overloaded {
                in_flight,
                limit: self.max_concurrent,
            });
        }

        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if now < ready_at {
                return Err(Rejection::TooSoon {
                    retry_in: ready_at - now,
                });
            }
        }

        let limit = self.max_concurrent;
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|n| Rejection::Overloaded {
                in_flight: n,
                limit,
            })?;

        *last = Some(now);
        Ok(AdmissionTicket {
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

/// One admitted slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionTicket {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
