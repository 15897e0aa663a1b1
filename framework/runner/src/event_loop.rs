//! A single-threaded cooperative scheduler.
//!
//! Tasks are boxed futures polled on the calling thread. The only transfer points between tasks
//! are their suspension points: a task that never returns `Pending` runs to completion before any
//! other task gets polled. Timers live in a min-heap and wake their task through a
//! [std::task::Wake] waker that pushes the task id onto the ready queue.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::{Duration, Instant};

use exec_harness_core::prelude::DelegatedShutdownListener;
use parking_lot::Mutex;

pub type TaskId = u64;

type LocalBoxFuture = Pin<Box<dyn Future<Output = ()>>>;

#[derive(Debug, Default)]
struct ReadyQueue {
    ids: Mutex<VecDeque<TaskId>>,
}

impl ReadyQueue {
    fn push(&self, id: TaskId) {
        self.ids.lock().push_back(id);
    }

    fn drain(&self) -> Vec<TaskId> {
        self.ids.lock().drain(..).collect()
    }
}

struct TaskWaker {
    id: TaskId,
    ready: Arc<ReadyQueue>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.push(self.id);
    }
}

#[derive(Default)]
struct Timers {
    next_seq: u64,
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    wakers: HashMap<u64, Waker>,
    fired: HashSet<u64>,
}

impl Timers {
    fn register(&mut self, wake_at: Instant, waker: Waker) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((wake_at, seq)));
        self.wakers.insert(seq, waker);
        seq
    }

    /// Wake every timer due at `now`. Entries whose [Sleep] was dropped are discarded.
    fn fire_due(&mut self, now: Instant) {
        while let Some(Reverse((wake_at, seq))) = self.heap.peek().copied() {
            if wake_at > now {
                break;
            }
            self.heap.pop();
            if let Some(waker) = self.wakers.remove(&seq) {
                self.fired.insert(seq);
                waker.wake();
            }
        }
    }

    fn next_due(&mut self) -> Option<Instant> {
        while let Some(Reverse((wake_at, seq))) = self.heap.peek().copied() {
            if self.wakers.contains_key(&seq) {
                return Some(wake_at);
            }
            self.heap.pop();
        }
        None
    }
}

#[derive(Default)]
struct Shared {
    timers: RefCell<Timers>,
    staged: RefCell<Vec<(TaskId, LocalBoxFuture)>>,
    cancelled: RefCell<Vec<TaskId>>,
    next_task: Cell<TaskId>,
}

/// Spawn, cancel and sleep from inside or outside the loop.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Rc<Shared>,
}

impl LoopHandle {
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.spawn_with(|_| future)
    }

    /// Spawn a future that needs to know its own task id.
    pub fn spawn_with<M, F>(&self, make: M) -> JoinHandle<F::Output>
    where
        M: FnOnce(TaskId) -> F,
        F: Future + 'static,
        F::Output: 'static,
    {
        let id = self.shared.next_task.get();
        self.shared.next_task.set(id + 1);

        let output = Rc::new(RefCell::new(None));
        let slot = output.clone();
        let future = make(id);
        let task: LocalBoxFuture = Box::pin(async move {
            let value = future.await;
            *slot.borrow_mut() = Some(value);
        });
        self.shared.staged.borrow_mut().push((id, task));

        JoinHandle {
            id,
            output,
            handle: self.clone(),
        }
    }

    /// Drop the task at its next turn. Cancelling a finished or unknown task does nothing.
    pub fn cancel(&self, id: TaskId) {
        self.shared.cancelled.borrow_mut().push(id);
    }

    /// A timer that completes once `duration` has passed.
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep {
            shared: self.shared.clone(),
            wake_at: Instant::now() + duration,
            timer: None,
            done: false,
        }
    }
}

/// The output slot of a spawned task.
pub struct JoinHandle<T> {
    id: TaskId,
    output: Rc<RefCell<Option<T>>>,
    handle: LoopHandle,
}

impl<T> JoinHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.output.borrow().is_some()
    }

    /// The task output, if the task ran to completion. Cancelled tasks never produce one.
    pub fn try_take(&self) -> Option<T> {
        self.output.borrow_mut().take()
    }

    pub fn cancel(&self) {
        self.handle.cancel(self.id);
    }
}

/// A suspension point on the loop's timer heap.
pub struct Sleep {
    shared: Rc<Shared>,
    wake_at: Instant,
    timer: Option<u64>,
    done: bool,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(());
        }

        let mut timers = this.shared.timers.borrow_mut();
        match this.timer {
            Some(seq) if timers.fired.remove(&seq) => {
                this.done = true;
                Poll::Ready(())
            }
            Some(seq) => {
                timers.wakers.insert(seq, cx.waker().clone());
                Poll::Pending
            }
            None if Instant::now() >= this.wake_at => {
                this.done = true;
                Poll::Ready(())
            }
            None => {
                this.timer = Some(timers.register(this.wake_at, cx.waker().clone()));
                Poll::Pending
            }
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(seq) = self.timer {
            let mut timers = self.shared.timers.borrow_mut();
            timers.wakers.remove(&seq);
            timers.fired.remove(&seq);
        }
    }
}

/// How a call to [EventLoop::run] ended.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Tasks dropped by [LoopHandle::cancel] or because the loop was stopped.
    pub cancelled: Vec<TaskId>,
    /// The stop signal fired while tasks were still pending.
    pub interrupted: bool,
    /// Tasks were pending but nothing could ever wake them.
    pub stalled: usize,
}

struct Task {
    future: LocalBoxFuture,
    waker: Waker,
}

pub struct EventLoop {
    shared: Rc<Shared>,
    ready: Arc<ReadyQueue>,
    tasks: HashMap<TaskId, Task>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared::default()),
            ready: Arc::new(ReadyQueue::default()),
            tasks: HashMap::new(),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.handle().spawn(future)
    }

    /// Run a single future to completion, or until the stop signal fires.
    pub fn block_on<F>(
        &mut self,
        future: F,
        listener: &DelegatedShutdownListener,
    ) -> Option<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let handle = self.spawn(future);
        self.run(listener);
        handle.try_take()
    }

    /// Poll tasks until none are left. When the stop signal fires every remaining task is dropped.
    pub fn run(&mut self, listener: &DelegatedShutdownListener) -> LoopOutcome {
        let mut outcome = LoopOutcome::default();

        loop {
            self.admit_staged();
            self.apply_cancellations(&mut outcome);

            if self.tasks.is_empty() {
                break;
            }

            if listener.should_shutdown() {
                log::debug!("Stopping event loop with {} pending task(s)", self.tasks.len());
                outcome.interrupted = true;
                outcome.cancelled.extend(self.drop_all());
                break;
            }

            self.shared.timers.borrow_mut().fire_due(Instant::now());

            let ready = self.ready.drain();
            if ready.is_empty() {
                let next_due = self.shared.timers.borrow_mut().next_due();
                match next_due {
                    Some(wake_at) => {
                        listener.sleep(wake_at.saturating_duration_since(Instant::now()));
                    }
                    None => {
                        log::error!("Event loop stalled with {} pending task(s)", self.tasks.len());
                        outcome.stalled = self.tasks.len();
                        outcome.cancelled.extend(self.drop_all());
                        break;
                    }
                }
                continue;
            }

            for id in ready {
                let Some(task) = self.tasks.get_mut(&id) else {
                    continue;
                };
                let mut cx = Context::from_waker(&task.waker);
                if task.future.as_mut().poll(&mut cx).is_ready() {
                    log::trace!("Task #{id} finished");
                    self.tasks.remove(&id);
                }
            }
        }

        outcome
    }

    fn admit_staged(&mut self) {
        let staged = std::mem::take(&mut *self.shared.staged.borrow_mut());
        for (id, future) in staged {
            let waker = Waker::from(Arc::new(TaskWaker {
                id,
                ready: self.ready.clone(),
            }));
            self.tasks.insert(id, Task { future, waker });
            self.ready.push(id);
        }
    }

    fn apply_cancellations(&mut self, outcome: &mut LoopOutcome) {
        let cancelled = std::mem::take(&mut *self.shared.cancelled.borrow_mut());
        for id in cancelled {
            if self.tasks.remove(&id).is_some() {
                log::debug!("Cancelled task #{id}");
                outcome.cancelled.push(id);
            }
        }
    }

    fn drop_all(&mut self) -> Vec<TaskId> {
        let mut ids = self.tasks.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        self.tasks.clear();
        ids
    }
}
