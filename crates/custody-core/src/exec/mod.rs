//! The main execution context.
//!
//! All confinement-state mutation and every environment-affecting effect
//! runs on a single context: a tick-driven task queue bound to exactly one
//! thread. Other threads may submit work (immediately, delayed, or
//! repeating) but never execute it; deferred protocol effects are expressed
//! as scheduled continuations on this queue rather than blocking waits.

use crate::domain::errors::CustodyError;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::ThreadId;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Wall-clock length of one scheduler tick.
pub const TICK_MS: u64 = 50;

/// Delay before the deferred possession-store continuation runs, in ticks.
pub const STORE_DELAY_TICKS: u64 = 10;

/// Delay before the post-release relocation continuation runs, in ticks.
pub const RELEASE_RELOCATE_DELAY_TICKS: u64 = 5;

type Task = Box<dyn FnOnce() + Send + 'static>;
type RepeatingFn = Box<dyn FnMut() + Send + 'static>;

struct Delayed {
    due: u64,
    seq: u64,
    task: Task,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    // Reversed so the BinaryHeap pops the earliest due tick first, FIFO
    // within a tick.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Repeating {
    next_due: u64,
    period: u64,
    task: RepeatingFn,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Task>,
    delayed: BinaryHeap<Delayed>,
    repeating: Vec<Repeating>,
    seq: u64,
}

struct Inner {
    queue: Mutex<Queue>,
    main_thread: OnceLock<ThreadId>,
    tick: AtomicU64,
    shutdown: AtomicBool,
}

/// Handle to the main context. Cloneable and shareable across threads;
/// execution stays on the bound thread.
#[derive(Clone)]
pub struct MainContext {
    inner: Arc<Inner>,
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MainContext {
    /// Create an unbound context. A driver (or test) claims the executing
    /// thread with [`MainContext::bind_current_thread`] before any task
    /// runs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(Queue::default()),
                main_thread: OnceLock::new(),
                tick: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// A context bound to the calling thread, for deterministic tests.
    #[must_use]
    pub fn for_testing() -> Self {
        let ctx = Self::new();
        ctx.bind_current_thread();
        ctx
    }

    /// Claim the calling thread as the main context. Returns false when a
    /// different thread already holds the binding.
    pub fn bind_current_thread(&self) -> bool {
        let id = std::thread::current().id();
        *self.inner.main_thread.get_or_init(|| id) == id
    }

    /// Whether the calling thread is the bound main context.
    #[must_use]
    pub fn is_main_context(&self) -> bool {
        self.inner
            .main_thread
            .get()
            .is_some_and(|id| *id == std::thread::current().id())
    }

    /// Error with `WrongExecutionContext` unless called on the bound thread.
    pub fn ensure_main(&self, operation: &'static str) -> Result<(), CustodyError> {
        if self.is_main_context() {
            Ok(())
        } else {
            Err(CustodyError::WrongExecutionContext { operation })
        }
    }

    /// The current tick count.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.inner.tick.load(Ordering::SeqCst)
    }

    /// Submit a task to run on the next tick. Callable from any thread.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        let Ok(mut queue) = self.inner.queue.lock() else {
            return;
        };
        queue.ready.push_back(Box::new(task));
    }

    /// Submit a task to run after `delay` ticks. Callable from any thread.
    pub fn submit_after(&self, delay: u64, task: impl FnOnce() + Send + 'static) {
        if delay == 0 {
            self.submit(task);
            return;
        }
        let due = self.current_tick() + delay;
        let Ok(mut queue) = self.inner.queue.lock() else {
            return;
        };
        let seq = queue.seq;
        queue.seq += 1;
        queue.delayed.push(Delayed {
            due,
            seq,
            task: Box::new(task),
        });
    }

    /// Submit a repeating task: first run after `initial_delay` ticks, then
    /// every `period` ticks. Callable from any thread.
    pub fn submit_repeating(
        &self,
        initial_delay: u64,
        period: u64,
        task: impl FnMut() + Send + 'static,
    ) {
        let next_due = self.current_tick() + initial_delay.max(1);
        let Ok(mut queue) = self.inner.queue.lock() else {
            return;
        };
        queue.repeating.push(Repeating {
            next_due,
            period: period.max(1),
            task: Box::new(task),
        });
    }

    /// Advance the scheduler by `ticks`, running everything that comes due.
    ///
    /// Tasks submitted while a tick executes run on a later tick, so a
    /// continuation chain advances one link per tick. Only the bound thread
    /// may drive the queue; calls from other threads are dropped with a
    /// warning.
    pub fn advance(&self, ticks: u64) {
        if !self.bind_current_thread() {
            warn!("advance called off the main context; ignoring");
            return;
        }

        for _ in 0..ticks {
            let now = self.inner.tick.fetch_add(1, Ordering::SeqCst) + 1;

            let (batch, mut due_repeating) = {
                let Ok(mut queue) = self.inner.queue.lock() else {
                    return;
                };

                let mut batch: Vec<Task> = queue.ready.drain(..).collect();
                while queue
                    .delayed
                    .peek()
                    .is_some_and(|delayed| delayed.due <= now)
                {
                    if let Some(delayed) = queue.delayed.pop() {
                        batch.push(delayed.task);
                    }
                }

                let mut due = Vec::new();
                let mut i = 0;
                while i < queue.repeating.len() {
                    if queue.repeating[i].next_due <= now {
                        due.push(queue.repeating.swap_remove(i));
                    } else {
                        i += 1;
                    }
                }

                (batch, due)
            };

            for task in batch {
                task();
            }

            for repeating in &mut due_repeating {
                (repeating.task)();
                repeating.next_due = now + repeating.period;
            }

            if !due_repeating.is_empty() {
                let Ok(mut queue) = self.inner.queue.lock() else {
                    return;
                };
                queue.repeating.extend(due_repeating);
            }
        }
    }

    /// Ask the driver to stop after the current tick.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }
}

/// Drive the context at a fixed tick interval until shutdown.
///
/// Must run on a current-thread runtime so every tick executes on the same
/// OS thread; use [`spawn_driver`] unless you are providing your own pinned
/// runtime.
pub async fn drive(ctx: MainContext, tick: Duration) {
    ctx.bind_current_thread();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !ctx.is_shut_down() {
        interval.tick().await;
        ctx.advance(1);
    }
}

/// Spawn a dedicated driver thread running [`drive`] on a current-thread
/// runtime at the standard tick length.
pub fn spawn_driver(ctx: MainContext) -> std::io::Result<std::thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    std::thread::Builder::new()
        .name("custody-main".into())
        .spawn(move || runtime.block_on(drive(ctx, Duration::from_millis(TICK_MS))))
}
