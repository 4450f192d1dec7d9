//! Cooperative job scheduler.
//!
//! Jobs are named, delayed or periodic callbacks advanced once per
//! control-loop tick. Recurring jobs use fixed-phase timing: the next
//! fire time advances by exactly one interval from the previous
//! scheduled time, so late ticks never accumulate drift.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::error::SchedulerError;

/// A job callback. Jobs that need to reach the wire capture a
/// [`crate::worker::WorkerPipe`] handle.
pub type JobFn = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

struct Job {
    name: String,
    callback: JobFn,
    interval: Duration,
    recurring: bool,
    next_fire: Instant,
}

/// The scheduler: a table of named jobs, ticked by the control loop.
#[derive(Default)]
pub struct Scheduler {
    jobs: HashMap<String, Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job firing `interval` from `now` (and every interval
    /// after that when `recurring`).
    pub fn create_job(
        &mut self,
        name: impl Into<String>,
        interval: Duration,
        recurring: bool,
        now: Instant,
        callback: JobFn,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        if self.jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        let next_fire = now + interval;
        debug!(job = %name, ?interval, recurring, "scheduled job");
        self.jobs.insert(
            name.clone(),
            Job {
                name,
                callback,
                interval,
                recurring,
                next_fire,
            },
        );
        Ok(())
    }

    /// Remove a job by name.
    pub fn remove_job(&mut self, name: &str) -> Result<(), SchedulerError> {
        self.jobs
            .remove(name)
            .map(|job| debug!(job = %job.name, "removed job"))
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))
    }

    pub fn has_job(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop every job (connection teardown).
    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    /// Run every due job.
    ///
    /// A callback error is logged and does not unschedule the job;
    /// recurring jobs continue on their original phase. One-shot jobs
    /// are removed after firing.
    pub fn tick(&mut self, now: Instant) {
        let mut finished = Vec::new();

        for job in self.jobs.values_mut() {
            if job.next_fire > now {
                continue;
            }

            if let Err(e) = (job.callback)() {
                error!(job = %job.name, error = %e, "job callback failed");
            }

            if job.recurring {
                // Fixed phase: advance from the scheduled time, not `now`.
                job.next_fire += job.interval;
            } else {
                finished.push(job.name.clone());
            }
        }

        for name in finished {
            self.jobs.remove(&name);
        }
    }

    #[cfg(test)]
    fn next_fire(&self, name: &str) -> Option<Instant> {
        self.jobs.get(name).map(|j| j.next_fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_job(counter: &Arc<AtomicUsize>) -> JobFn {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_fires_only_when_due() {
        let mut sched = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();
        let interval = Duration::from_secs(10);

        sched
            .create_job("x", interval, false, t0, counting_job(&fired))
            .unwrap();

        sched.tick(t0 + Duration::from_secs(5));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sched.tick(t0 + Duration::from_secs(10));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_shot_removed_after_firing() {
        let mut sched = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();

        sched
            .create_job("once", Duration::from_secs(1), false, t0, counting_job(&fired))
            .unwrap();

        sched.tick(t0 + Duration::from_secs(2));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!sched.has_job("once"));

        sched.tick(t0 + Duration::from_secs(4));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fixed_phase_no_drift() {
        let mut sched = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let t0 = Instant::now();
        let i = Duration::from_secs(60);
        let eps = Duration::from_secs(3);

        sched.create_job("p", i, true, t0, counting_job(&fired)).unwrap();
        assert_eq!(sched.next_fire("p"), Some(t0 + i));

        // T+I+eps fires; next advances to exactly T+2I, not T+I+eps+I.
        sched.tick(t0 + i + eps);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(sched.next_fire("p"), Some(t0 + i * 2));

        sched.tick(t0 + i * 2 + eps);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(sched.next_fire("p"), Some(t0 + i * 3));

        // T+3I-eps is before the scheduled phase: no fire.
        sched.tick(t0 + i * 3 - eps);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(sched.next_fire("p"), Some(t0 + i * 3));
    }

    #[test]
    fn test_duplicate_job_rejected() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();

        sched
            .create_job("x", Duration::from_secs(1), true, t0, Box::new(|| Ok(())))
            .unwrap();
        let err = sched
            .create_job("x", Duration::from_secs(2), false, t0, Box::new(|| Ok(())))
            .unwrap_err();

        assert_eq!(err, SchedulerError::DuplicateJob("x".into()));
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn test_remove_unknown_job() {
        let mut sched = Scheduler::new();
        assert_eq!(
            sched.remove_job("ghost"),
            Err(SchedulerError::UnknownJob("ghost".into()))
        );
    }

    #[test]
    fn test_failing_recurring_job_stays_scheduled() {
        let mut sched = Scheduler::new();
        let t0 = Instant::now();
        let i = Duration::from_secs(5);

        sched
            .create_job("flaky", i, true, t0, Box::new(|| anyhow::bail!("boom")))
            .unwrap();

        sched.tick(t0 + i);
        assert!(sched.has_job("flaky"));
        assert_eq!(sched.next_fire("flaky"), Some(t0 + i * 2));
    }
}
