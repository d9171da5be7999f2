//! Incremental batch processing that never blocks its host loop for long.
//!
//! A chunked job drains its items in time-boxed bursts: each burst processes
//! items synchronously until a 100 ms wall-clock budget runs out, then yields
//! by rescheduling itself on the [`TimerLoop`] after the job's inter-burst
//! delay. Other tasks scheduled on the same loop get to run between bursts,
//! so a job over tens of thousands of items never freezes the host.
//!
//! The loop is single-threaded and cooperative; nothing here spawns threads.
//! Within one job, items are processed strictly in input order, one at a
//! time. Across jobs no ordering is guaranteed and bursts interleave at the
//! loop level.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::debug;

/// Wall-clock budget for one synchronous burst.
pub const BURST_BUDGET: Duration = Duration::from_millis(100);

/// Inter-burst delay applied when the caller passes `None` or zero.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(25);

/// Monotonic time source for the burst budget. Only differences between
/// readings are meaningful, so tests can inject an artificial clock instead
/// of waiting out real bursts.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by `Instant`, anchored at construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

type Task = Box<dyn FnOnce(&mut TimerLoop)>;

struct Scheduled {
    deadline: Duration,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// The deferred-execution primitive: a timer queue of one-shot tasks run in
/// deadline order, FIFO among equal deadlines. Tasks receive the loop so they
/// can schedule continuations.
pub struct TimerLoop {
    queue: BinaryHeap<Reverse<Scheduled>>,
    now: Duration,
    seq: u64,
}

impl TimerLoop {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            now: Duration::ZERO,
            seq: 0,
        }
    }

    /// The loop's virtual time: the deadline of the most recently run task.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule_after(&mut self, delay: Duration, task: impl FnOnce(&mut TimerLoop) + 'static) {
        let deadline = self.now + delay;
        self.seq += 1;
        self.queue.push(Reverse(Scheduled {
            deadline,
            seq: self.seq,
            task: Box::new(task),
        }));
    }

    /// Runs tasks until the queue is empty, advancing virtual time to each
    /// deadline. Tasks scheduled by running tasks are picked up too.
    pub fn run_until_idle(&mut self) {
        while let Some(Reverse(next)) = self.queue.pop() {
            self.now = self.now.max(next.deadline);
            (next.task)(self);
        }
    }
}

impl Default for TimerLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle for a running chunked job. After `cancel()`, no
/// further burst runs and the completion callback is never invoked.
#[derive(Clone)]
pub struct ChunkHandle {
    cancelled: Arc<AtomicBool>,
}

impl ChunkHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A worker failure captured during a burst; the rest of the burst still ran.
pub struct ChunkFailure {
    pub index: usize,
    pub error: anyhow::Error,
}

/// Handed to the completion callback once every item has been processed.
pub struct ChunkOutcome<T, C> {
    pub items: Vec<T>,
    pub context: C,
    pub failures: Vec<ChunkFailure>,
}

struct ChunkJob<T, C, F, D> {
    items: Vec<T>,
    next: usize,
    context: C,
    process: F,
    delay: Duration,
    on_done: D,
    failures: Vec<ChunkFailure>,
    cancelled: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl<T, C, F, D> ChunkJob<T, C, F, D>
where
    T: 'static,
    C: 'static,
    F: FnMut(&mut C, &T) -> Result<()> + 'static,
    D: FnOnce(ChunkOutcome<T, C>) + 'static,
{
    fn burst(mut self: Box<Self>, timers: &mut TimerLoop) {
        if self.cancelled.load(Ordering::Relaxed) {
            debug!(
                "chunk job cancelled with {} of {} items unprocessed",
                self.items.len() - self.next,
                self.items.len()
            );
            return;
        }

        let start = self.clock.now();
        while self.next < self.items.len() {
            let index = self.next;
            if let Err(error) = (self.process)(&mut self.context, &self.items[index]) {
                self.failures.push(ChunkFailure { index, error });
            }
            self.next += 1;
            if self.clock.now().saturating_sub(start) >= BURST_BUDGET {
                break;
            }
        }

        if self.next < self.items.len() {
            if !self.cancelled.load(Ordering::Relaxed) {
                let delay = self.delay;
                debug!("burst over budget, {} items remain", self.items.len() - self.next);
                timers.schedule_after(delay, move |timers| self.burst(timers));
            }
        } else {
            debug!(
                "chunk job complete: {} items, {} failures",
                self.items.len(),
                self.failures.len()
            );
            let job = *self;
            (job.on_done)(ChunkOutcome {
                items: job.items,
                context: job.context,
                failures: job.failures,
            });
        }
    }
}

/// Starts a chunked job over `items`.
///
/// The job takes ownership of the items (so nothing external can mutate them
/// mid-flight) and processes them strictly in order, invoking `process` with
/// the job-owned `context` once per item. Worker errors are collected, not
/// fatal. Nothing runs synchronously inside this call: even an empty job
/// completes on its first scheduled tick, after the caller's stack unwinds.
///
/// `delay` is the pause between bursts; `None` or zero means 25 ms.
/// `on_done` fires exactly once when the last item has been processed, and
/// never fires at all if the returned handle is cancelled first.
pub fn run_chunked<T, C, F, D>(
    timers: &mut TimerLoop,
    clock: Arc<dyn Clock>,
    items: Vec<T>,
    context: C,
    process: F,
    delay: Option<Duration>,
    on_done: D,
) -> ChunkHandle
where
    T: 'static,
    C: 'static,
    F: FnMut(&mut C, &T) -> Result<()> + 'static,
    D: FnOnce(ChunkOutcome<T, C>) + 'static,
{
    let delay = match delay {
        Some(d) if !d.is_zero() => d,
        _ => DEFAULT_DELAY,
    };
    let cancelled = Arc::new(AtomicBool::new(false));
    debug!("scheduling chunk job: {} items, delay {:?}", items.len(), delay);
    let job = Box::new(ChunkJob {
        items,
        next: 0,
        context,
        process,
        delay,
        on_done,
        failures: Vec::new(),
        cancelled: Arc::clone(&cancelled),
        clock,
    });
    timers.schedule_after(delay, move |timers| job.burst(timers));
    ChunkHandle { cancelled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Clock that advances by a fixed step on every reading, so burst budgets
    /// elapse deterministically without real waits.
    struct SteppingClock {
        now_ms: Cell<u64>,
        step_ms: u64,
    }

    impl SteppingClock {
        fn arc(step_ms: u64) -> Arc<dyn Clock> {
            Arc::new(Self {
                now_ms: Cell::new(0),
                step_ms,
            })
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Duration {
            let now = self.now_ms.get();
            self.now_ms.set(now + self.step_ms);
            Duration::from_millis(now)
        }
    }

    /// Runs a job over `0..count` to completion, returning the items handed
    /// to `on_done` (or `None` if it never fired). The worker records every
    /// processed value so completion can assert order and coverage.
    fn run_to_completion(count: usize, step_ms: u64) -> Option<Vec<usize>> {
        let mut timers = TimerLoop::new();
        let done: Rc<RefCell<Option<Vec<usize>>>> = Rc::new(RefCell::new(None));
        let done_tx = Rc::clone(&done);
        let items: Vec<usize> = (0..count).collect();
        run_chunked(
            &mut timers,
            SteppingClock::arc(step_ms),
            items,
            Vec::new(),
            |seen: &mut Vec<usize>, item: &usize| {
                seen.push(*item);
                Ok(())
            },
            Some(Duration::from_millis(5)),
            move |outcome| {
                *done_tx.borrow_mut() = Some(outcome.items.clone());
                assert!(outcome.failures.is_empty());
                assert_eq!(outcome.context.len(), outcome.items.len());
                assert_eq!(outcome.context, outcome.items);
            },
        );
        timers.run_until_idle();
        let result = done.borrow_mut().take();
        result
    }

    #[test]
    fn empty_job_completes_on_first_tick() {
        assert_eq!(run_to_completion(0, 1), Some(Vec::new()));
    }

    #[test]
    fn single_item_job_completes() {
        assert_eq!(run_to_completion(1, 1), Some(vec![0]));
    }

    #[test]
    fn large_job_processes_every_item_in_order() {
        // step 1 ms => roughly 100 items per burst => ~100 bursts
        assert_eq!(run_to_completion(10_000, 1), Some((0..10_000).collect::<Vec<_>>()));
    }

    #[test]
    fn nothing_runs_synchronously() {
        let mut timers = TimerLoop::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_tx = Rc::clone(&seen);
        run_chunked(
            &mut timers,
            SteppingClock::arc(1),
            vec![1, 2, 3],
            seen_tx,
            |seen: &mut Rc<RefCell<Vec<i32>>>, item: &i32| {
                seen.borrow_mut().push(*item);
                Ok(())
            },
            None,
            |_| {},
        );
        // The caller's stack has not unwound yet; no item may be processed.
        assert!(seen.borrow().is_empty());
        timers.run_until_idle();
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn independent_task_fires_between_bursts() {
        let mut timers = TimerLoop::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        // step 60 ms => two items per burst => bursts at t = 5, 10, ..., 50
        let events_tx = Rc::clone(&events);
        run_chunked(
            &mut timers,
            SteppingClock::arc(60),
            (0..20).collect::<Vec<i32>>(),
            events_tx,
            |events: &mut Rc<RefCell<Vec<String>>>, item: &i32| {
                events.borrow_mut().push(format!("item {item}"));
                Ok(())
            },
            Some(Duration::from_millis(5)),
            {
                let events_tx = Rc::clone(&events);
                move |_| events_tx.borrow_mut().push("done".to_string())
            },
        );
        let events_tx = Rc::clone(&events);
        timers.schedule_after(Duration::from_millis(30), move |_| {
            events_tx.borrow_mut().push("ping".to_string());
        });
        timers.run_until_idle();

        let events = events.borrow();
        let ping = events.iter().position(|e| e == "ping").expect("ping ran");
        let done = events.iter().position(|e| e == "done").expect("job finished");
        assert!(ping < done, "independent task must not wait for the job: {events:?}");
        assert!(ping > 0, "some items should precede the ping: {events:?}");
    }

    #[test]
    fn cancel_suppresses_completion() {
        let mut timers = TimerLoop::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(Cell::new(false));

        let seen_tx = Rc::clone(&seen);
        let done_tx = Rc::clone(&done);
        let handle = run_chunked(
            &mut timers,
            SteppingClock::arc(60),
            (0..20).collect::<Vec<i32>>(),
            seen_tx,
            |seen: &mut Rc<RefCell<Vec<i32>>>, item: &i32| {
                seen.borrow_mut().push(*item);
                Ok(())
            },
            Some(Duration::from_millis(5)),
            move |_| done_tx.set(true),
        );
        let cancel = handle.clone();
        timers.schedule_after(Duration::from_millis(12), move |_| cancel.cancel());
        timers.run_until_idle();

        assert!(handle.is_cancelled());
        assert!(!done.get(), "on_done must never fire after cancel");
        let seen = seen.borrow();
        assert!(!seen.is_empty() && seen.len() < 20, "job stopped mid-way: {seen:?}");
    }

    #[test]
    fn worker_errors_do_not_abort_the_burst() {
        let mut timers = TimerLoop::new();
        let result = Rc::new(RefCell::new(None));
        let result_tx = Rc::clone(&result);
        run_chunked(
            &mut timers,
            SteppingClock::arc(1),
            vec!["ok", "bad", "ok", "bad", "ok"],
            0usize,
            |processed: &mut usize, item: &&str| {
                *processed += 1;
                if *item == "bad" {
                    return Err(anyhow!("rejected"));
                }
                Ok(())
            },
            None,
            move |outcome| *result_tx.borrow_mut() = Some(outcome),
        );
        timers.run_until_idle();

        let result = result.borrow();
        let outcome = result.as_ref().expect("job finished");
        assert_eq!(outcome.context, 5, "every item was still processed");
        let indices: Vec<usize> = outcome.failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn falsy_delay_defaults_to_25ms() {
        for delay in [None, Some(Duration::ZERO)] {
            let mut timers = TimerLoop::new();
            run_chunked(
                &mut timers,
                SteppingClock::arc(1),
                vec![1],
                (),
                |_: &mut (), _: &i32| Ok(()),
                delay,
                |_| {},
            );
            timers.run_until_idle();
            assert_eq!(timers.now(), DEFAULT_DELAY);
        }
    }

    #[test]
    fn timer_loop_runs_equal_deadlines_in_fifo_order() {
        let mut timers = TimerLoop::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..5 {
            let order_tx = Rc::clone(&order);
            timers.schedule_after(Duration::from_millis(10), move |_| {
                order_tx.borrow_mut().push(i);
            });
        }
        timers.run_until_idle();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
