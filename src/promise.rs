use std::{
    cell::RefCell,
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use log::{debug, trace};

use crate::{
    resolution::{Outcome, Resolution, Thenable},
    runtime::Runtime,
};

/// The settlement status of a [`Promise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

/// A queued reaction. Receives the final outcome and dispatches to exactly one
/// of its handlers.
pub(crate) type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>)>;

enum State<T, E> {
    Pending(Vec<Reaction<T, E>>),
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn settled(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(value) => State::Fulfilled(value),
            Err(reason) => State::Rejected(reason),
        }
    }
}

struct Core<T, E> {
    state: State<T, E>,
    runtime: Runtime,
}

/// A value or failure that may not be known yet.
///
/// A promise starts pending and settles at most once, either fulfilled with a
/// `T` or rejected with an `E`. Consumers attach reactions with
/// [`then`](Self::then) and its shorthands, each of which returns a new,
/// derived promise settled from the reaction's [`Outcome`].
///
/// # Always asynchronous
/// Reactions never run in the synchronous turn that attached or triggered them.
/// They are handed to the promise's [`Runtime`] and run when its scheduler
/// gets to them. With the default runtime that means the next
/// [`run_until_idle`](crate::run_until_idle) on this thread.
///
/// # Sharing
/// Cloning a `Promise` yields another handle to the same promise. Promises are
/// single-threaded (`!Send`).
///
/// # Example
/// ```
/// # use thenable::{run_until_idle, Promise, Resolution};
/// let p = Promise::<i32, String>::new(|resolve, _| {
///     resolve.resolve(5);
///     Ok(())
/// })
/// .map(|v| Ok(v + 1))
/// .and_then(|v| Err::<Resolution<i32, _>, _>(format!("bad value {}", v)))
/// .catch(|reason| Ok(Resolution::Value(reason.len() as i32)));
///
/// run_until_idle().unwrap();
/// assert_eq!(p.try_result(), Some(Ok(11)));
/// ```
pub struct Promise<T, E> {
    core: Rc<RefCell<Core<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Promise {
            core: self.core.clone(),
        }
    }
}

/// Capability that fulfills a promise. Calls after the promise settled are
/// ignored.
pub struct Resolver<T, E> {
    core: Rc<RefCell<Core<T, E>>>,
}

/// Capability that rejects a promise. Calls after the promise settled are
/// ignored.
pub struct Rejecter<T, E> {
    core: Rc<RefCell<Core<T, E>>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Resolver {
            core: self.core.clone(),
        }
    }
}

impl<T, E> Clone for Rejecter<T, E> {
    fn clone(&self) -> Self {
        Rejecter {
            core: self.core.clone(),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Resolver<T, E> {
    /// Fulfills the promise with `value`.
    pub fn resolve(&self, value: T) {
        settle(&self.core, Ok(value));
    }

    /// Resolves the promise with a [`Resolution`]: plain values fulfill it,
    /// thenables are adopted.
    ///
    /// Adoption does not lock the promise. Until the thenable settles it, the
    /// promise can still be settled directly, and whichever settlement comes
    /// first wins.
    pub fn resolve_with(&self, resolution: Resolution<T, E>) {
        match resolution {
            Resolution::Value(value) => self.resolve(value),
            Resolution::Thenable(thenable) => {
                debug!("adopting thenable settlement");
                let reject = Rejecter {
                    core: self.core.clone(),
                };
                thenable.subscribe(self.clone(), reject);
            }
        }
    }

    /// Settles the promise from a reaction [`Outcome`].
    pub(crate) fn resolve_outcome(&self, outcome: Outcome<T, E>) {
        match outcome {
            Ok(resolution) => self.resolve_with(resolution),
            Err(reason) => settle(&self.core, Err(reason)),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Rejecter<T, E> {
    /// Rejects the promise with `reason`. The reason is used as given, even
    /// if it is itself promise-like.
    pub fn reject(&self, reason: E) {
        settle(&self.core, Err(reason));
    }
}

/// Moves a pending promise to its final state and dispatches every queued
/// reaction, in attachment order, from one scheduled task.
fn settle<T: Clone + 'static, E: Clone + 'static>(
    core: &Rc<RefCell<Core<T, E>>>,
    outcome: Result<T, E>,
) {
    let mut core = core.borrow_mut();
    let reactions = match &mut core.state {
        State::Pending(reactions) => mem::take(reactions),
        _ => {
            trace!("ignoring settlement of an already settled promise");
            return;
        }
    };

    if reactions.is_empty() {
        trace!("promise settled, no reactions queued");
        core.state = State::settled(outcome);
        return;
    }

    trace!("promise settled, dispatching {} reaction(s)", reactions.len());
    core.state = State::settled(outcome.clone());
    let runtime = core.runtime.clone();
    drop(core);

    runtime.schedule(Box::new(move || {
        // A panicking reaction must not starve its siblings; the first panic
        // is re-raised once every reaction has run.
        let mut panicked = None;
        for reaction in reactions {
            let outcome = outcome.clone();
            let ran = panic::catch_unwind(AssertUnwindSafe(move || reaction(outcome)));
            if let Err(payload) = ran {
                panicked.get_or_insert(payload);
            }
        }
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
    }));
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Creates a promise on the thread's default [`Runtime`], running
    /// `executor` synchronously with the promise's settlement capabilities.
    ///
    /// If the executor returns `Err(reason)` the promise is rejected with it,
    /// unless the executor already settled it.
    ///
    /// # Examples
    /// ## Settling synchronously
    /// ```
    /// # use thenable::Promise;
    /// let p = Promise::<_, ()>::new(|resolve, _| {
    ///     resolve.resolve("ready");
    ///     Ok(())
    /// });
    /// assert_eq!(p.try_result(), Some(Ok("ready")));
    /// ```
    ///
    /// ## Failing executor
    /// ```
    /// # use thenable::Promise;
    /// let p = Promise::<(), _>::new(|_, _| Err("no luck"));
    /// assert_eq!(p.try_result(), Some(Err("no luck")));
    /// ```
    pub fn new<F>(executor: F) -> Promise<T, E>
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E>,
    {
        Runtime::current().promise(executor)
    }

    /// Creates a pending promise on the thread's default [`Runtime`] and hands
    /// back its settlement capabilities.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let (p, resolve, _reject) = Promise::<u8, ()>::deferred();
    /// let doubled = p.map(|v| Ok(v * 2));
    /// resolve.resolve(4);
    /// run_until_idle().unwrap();
    /// assert_eq!(doubled.try_result(), Some(Ok(8)));
    /// ```
    pub fn deferred() -> (Promise<T, E>, Resolver<T, E>, Rejecter<T, E>) {
        Runtime::current().deferred()
    }

    pub(crate) fn pending_in(runtime: Runtime) -> Promise<T, E> {
        Promise {
            core: Rc::new(RefCell::new(Core {
                state: State::Pending(Vec::new()),
                runtime,
            })),
        }
    }

    pub(crate) fn capabilities(&self) -> (Resolver<T, E>, Rejecter<T, E>) {
        (
            Resolver {
                core: self.core.clone(),
            },
            Rejecter {
                core: self.core.clone(),
            },
        )
    }

    /// The runtime this promise schedules its reactions on.
    pub fn runtime(&self) -> Runtime {
        self.core.borrow().runtime.clone()
    }

    /// Current settlement status.
    pub fn status(&self) -> Status {
        match self.core.borrow().state {
            State::Pending(_) => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    /// Returns `true` while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    /// A copy of the settled value or reason, or `None` while pending.
    pub fn try_result(&self) -> Option<Result<T, E>> {
        match &self.core.borrow().state {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Queues `reaction` while pending, or schedules it right away with a
    /// copy of the outcome once settled.
    pub(crate) fn attach(&self, reaction: Reaction<T, E>) {
        let mut core = self.core.borrow_mut();
        let outcome = match &mut core.state {
            State::Pending(reactions) => {
                reactions.push(reaction);
                return;
            }
            State::Fulfilled(value) => Ok(value.clone()),
            State::Rejected(reason) => Err(reason.clone()),
        };
        let runtime = core.runtime.clone();
        drop(core);

        trace!("reaction attached to a settled promise, scheduling");
        runtime.schedule(Box::new(move || reaction(outcome)));
    }

    /// Attaches a pair of reactions and returns the promise they settle.
    ///
    /// Exactly one of `on_fulfilled` and `on_rejected` runs, asynchronously,
    /// once this promise settles. The derived promise is then:
    /// - rejected with `reason` if the callback returned `Err(reason)`,
    /// - settled like the thenable if it returned
    ///   `Ok(Resolution::Thenable(..))`,
    /// - fulfilled with the value if it returned `Ok(Resolution::Value(..))`.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise, Resolution};
    /// let p = Promise::<i32, &str>::reject("fail").then::<String, &str, _, _>(
    ///     |v| Ok(Resolution::Value(format!("got {}", v))),
    ///     |e| Ok(Resolution::Value(format!("recovered from {}", e))),
    /// );
    /// run_until_idle().unwrap();
    /// assert_eq!(p.try_result(), Some(Ok("recovered from fail".to_string())));
    /// ```
    pub fn then<T2, E2, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<T2, E2>
    where
        T2: Clone + 'static,
        E2: Clone + 'static,
        F: FnOnce(T) -> Outcome<T2, E2> + 'static,
        R: FnOnce(E) -> Outcome<T2, E2> + 'static,
    {
        let derived = Promise::pending_in(self.runtime());
        let (resolve, _) = derived.capabilities();
        self.attach(Box::new(move |outcome| {
            let next = match outcome {
                Ok(value) => on_fulfilled(value),
                Err(reason) => on_rejected(reason),
            };
            resolve.resolve_outcome(next);
        }));
        derived
    }

    /// [`then`](Self::then) with only a fulfillment handler. Rejections pass
    /// through to the derived promise unchanged.
    pub fn and_then<T2, F>(&self, on_fulfilled: F) -> Promise<T2, E>
    where
        T2: Clone + 'static,
        F: FnOnce(T) -> Outcome<T2, E> + 'static,
    {
        self.then(on_fulfilled, Err)
    }

    /// [`then`](Self::then) with only a rejection handler. Values pass
    /// through to the derived promise unchanged.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise, Resolution};
    /// let p = Promise::<u32, &str>::reject("offline")
    ///     .map(|v| Ok(v + 1))
    ///     .catch(|_| Ok(Resolution::Value(0)));
    /// run_until_idle().unwrap();
    /// assert_eq!(p.try_result(), Some(Ok(0)));
    /// ```
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Outcome<T, E> + 'static,
    {
        self.then(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    /// Maps the fulfillment value. Rejections pass through unchanged, and the
    /// callback can fail the derived promise by returning `Err`.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let p = Promise::<_, &str>::resolve(1)
    ///     .map(|v| Ok(v + 1))
    ///     .map(|v| if v > 1 { Err("too big") } else { Ok(v) });
    /// run_until_idle().unwrap();
    /// assert_eq!(p.try_result(), Some(Err("too big")));
    /// ```
    pub fn map<T2, F>(&self, callback: F) -> Promise<T2, E>
    where
        T2: Clone + 'static,
        F: FnOnce(T) -> Result<T2, E> + 'static,
    {
        self.and_then(|value| callback(value).map(Resolution::Value))
    }

    /// Maps the rejection reason, possibly recovering with a value or
    /// changing the reason type. Values pass through unchanged.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let p = Promise::<(), &str>::reject("fail")
    ///     .map_err(|e| Err(format!("1st: {}", e)))
    ///     .map_err(|e| Err(format!("2nd: {}", e)));
    /// run_until_idle().unwrap();
    /// assert_eq!(p.try_result(), Some(Err("2nd: 1st: fail".to_string())));
    /// ```
    pub fn map_err<E2, F>(&self, errback: F) -> Promise<T, E2>
    where
        E2: Clone + 'static,
        F: FnOnce(E) -> Result<T, E2> + 'static,
    {
        self.then(
            |value| Ok(Resolution::Value(value)),
            |reason| errback(reason).map(Resolution::Value),
        )
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Thenable<T, E> for Promise<T, E> {
    fn subscribe(self: Box<Self>, resolve: Resolver<T, E>, reject: Rejecter<T, E>) {
        self.attach(Box::new(move |outcome| match outcome {
            Ok(value) => resolve.resolve(value),
            Err(reason) => reject.reject(reason),
        }));
    }
}

impl Runtime {
    /// Creates a promise on this runtime. See [`Promise::new`].
    pub fn promise<T, E, F>(&self, executor: F) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E>,
    {
        let promise = Promise::pending_in(self.clone());
        let (resolve, reject) = promise.capabilities();
        if let Err(reason) = executor(resolve, reject.clone()) {
            debug!("executor failed, rejecting its promise");
            reject.reject(reason);
        }
        promise
    }

    /// Creates a pending promise on this runtime together with its settlement
    /// capabilities. See [`Promise::deferred`].
    pub fn deferred<T, E>(&self) -> (Promise<T, E>, Resolver<T, E>, Rejecter<T, E>)
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        let promise = Promise::pending_in(self.clone());
        let (resolve, reject) = promise.capabilities();
        (promise, resolve, reject)
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(core) = self.core.try_borrow() else {
            return f.write_str("Promise { <borrowed> }");
        };
        let mut out = f.debug_struct("Promise");
        match &core.state {
            State::Pending(reactions) => out
                .field("status", &Status::Pending)
                .field("reactions", &reactions.len()),
            State::Fulfilled(_) => out.field("status", &Status::Fulfilled),
            State::Rejected(_) => out.field("status", &Status::Rejected),
        };
        out.finish()
    }
}
