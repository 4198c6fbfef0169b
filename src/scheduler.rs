//! Deferred task execution.
//!
//! Promises never run a reaction in the same synchronous turn that attached
//! or triggered it. Instead they hand a [`Task`] to a [`Schedule`]
//! implementation, which runs it "later". The crate ships one scheduler,
//! [`TaskQueue`], a FIFO queue that is stepped by hand. Every thread has a
//! default queue, reachable through [`TaskQueue::current`] and drained by
//! [`run_until_idle`].

use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use log::{error, trace};

use crate::Error;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Something that can defer a [`Task`] until after the current synchronous
/// execution has unwound.
///
/// Implementations must run tasks in the order they were submitted, and must
/// never run a task from inside [`schedule`](Self::schedule) itself.
pub trait Schedule {
    /// Enqueues `task` to run later.
    fn schedule(&self, task: Task);
}

impl<S: Schedule + ?Sized> Schedule for Rc<S> {
    fn schedule(&self, task: Task) {
        (**self).schedule(task)
    }
}

thread_local! {
    static CURRENT: TaskQueue = TaskQueue::new();
}

/// A manually stepped FIFO task queue.
///
/// Cloning a `TaskQueue` yields another handle to the same queue.
///
/// # Example
/// ```
/// # use thenable::TaskQueue;
/// # use std::{cell::Cell, rc::Rc};
/// use thenable::Schedule;
///
/// let queue = TaskQueue::new();
/// let hits = Rc::new(Cell::new(0));
/// let h = hits.clone();
/// queue.schedule(Box::new(move || h.set(h.get() + 1)));
/// assert_eq!(hits.get(), 0);
/// assert_eq!(queue.run_until_idle(), Ok(1));
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    pub fn new() -> TaskQueue {
        TaskQueue::default()
    }

    /// Creates an empty queue with room for `capacity` tasks.
    pub fn with_capacity(capacity: usize) -> TaskQueue {
        TaskQueue {
            tasks: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Returns a handle to this thread's default queue.
    pub fn current() -> TaskQueue {
        CURRENT.with(TaskQueue::clone)
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Returns `true` if no task is waiting to run.
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Runs the oldest queued task, if any.
    ///
    /// Returns `Ok(true)` if a task ran and `Ok(false)` if the queue was
    /// empty. A panicking task is reported as [`Error::Panicked`]; the rest of
    /// the queue is left untouched.
    pub fn run_next(&self) -> Result<bool, Error> {
        // The borrow must end before the task runs: tasks schedule more tasks.
        let task = self.tasks.borrow_mut().pop_front();
        let Some(task) = task else {
            return Ok(false);
        };

        panic::catch_unwind(AssertUnwindSafe(task)).map_err(|_| {
            error!("scheduled task panicked, {} task(s) still queued", self.len());
            Error::Panicked
        })?;
        Ok(true)
    }

    /// Runs tasks until the queue is empty, including tasks enqueued by the
    /// tasks being run. Returns how many ran.
    pub fn run_until_idle(&self) -> Result<usize, Error> {
        let mut ran = 0;
        while self.run_next()? {
            ran += 1;
        }
        trace!("task queue idle after {} task(s)", ran);
        Ok(ran)
    }
}

impl Schedule for TaskQueue {
    fn schedule(&self, task: Task) {
        let mut tasks = self.tasks.borrow_mut();
        tasks.push_back(task);
        trace!("task scheduled, {} queued", tasks.len());
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("queued", &self.len()).finish()
    }
}

/// Drains this thread's default [`TaskQueue`].
///
/// Shorthand for `TaskQueue::current().run_until_idle()`.
pub fn run_until_idle() -> Result<usize, Error> {
    TaskQueue::current().run_until_idle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn runs_in_submission_order() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let log = log.clone();
            queue.schedule(Box::new(move || log.borrow_mut().push(i)));
        }
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.run_until_idle(), Ok(4));
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_scheduled_while_running_are_drained() {
        let queue = TaskQueue::with_capacity(2);
        let hits = Rc::new(Cell::new(0));
        let (q, h) = (queue.clone(), hits.clone());
        queue.schedule(Box::new(move || {
            h.set(h.get() + 1);
            let h = h.clone();
            q.schedule(Box::new(move || h.set(h.get() + 10)));
        }));
        assert_eq!(queue.run_next(), Ok(true));
        assert_eq!(hits.get(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_until_idle(), Ok(1));
        assert_eq!(hits.get(), 11);
        assert_eq!(queue.run_next(), Ok(false));
    }

    #[test]
    fn panicking_task_is_reported_and_queue_survives() {
        let queue = TaskQueue::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        queue.schedule(Box::new(|| panic!("boom")));
        queue.schedule(Box::new(move || h.set(1)));

        assert_eq!(queue.run_until_idle(), Err(Error::Panicked));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_until_idle(), Ok(1));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn current_is_shared_per_thread() {
        let a = TaskQueue::current();
        let b = TaskQueue::current();
        a.schedule(Box::new(|| {}));
        assert_eq!(b.len(), 1);
        assert_eq!(run_until_idle(), Ok(1));
        assert!(a.is_empty());
    }
}
