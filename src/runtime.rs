use std::{fmt, rc::Rc};

use crate::scheduler::{Schedule, Task, TaskQueue};

/// The scheduling capability a promise defers its reactions to.
///
/// Every promise belongs to a runtime. Promises created through the
/// [`Promise`](crate::Promise) statics use [`Runtime::current`], which wraps
/// the thread's default [`TaskQueue`]; promises derived through
/// [`then`](crate::Promise::then) and friends inherit their source's runtime.
/// Construct a runtime around your own [`Schedule`] to drive promises from an
/// event loop of your choosing.
///
/// # Example
/// ```
/// # use thenable::{Runtime, TaskQueue};
/// let queue = TaskQueue::new();
/// let rt = Runtime::new(queue.clone());
/// let p = rt.resolve::<_, ()>(20).map(|v| Ok(v + 1));
/// assert!(p.is_pending());
/// queue.run_until_idle().unwrap();
/// assert_eq!(p.try_result(), Some(Ok(21)));
/// ```
#[derive(Clone)]
pub struct Runtime {
    scheduler: Rc<dyn Schedule>,
}

impl Runtime {
    /// Creates a runtime that defers work to `scheduler`.
    pub fn new<S: Schedule + 'static>(scheduler: S) -> Runtime {
        Runtime {
            scheduler: Rc::new(scheduler),
        }
    }

    /// The runtime backed by this thread's default [`TaskQueue`].
    pub fn current() -> Runtime {
        Runtime::new(TaskQueue::current())
    }

    pub(crate) fn schedule(&self, task: Task) {
        self.scheduler.schedule(task)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::current()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}
