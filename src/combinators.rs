use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::trace;

use crate::{
    promise::Promise,
    resolution::{Resolution, Thenable},
    runtime::Runtime,
};

impl Runtime {
    /// Creates a promise fulfilled with `value`. See [`Promise::resolve`].
    pub fn resolve<T, E>(&self, value: T) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.from_result(Ok(value))
    }

    /// Creates a promise rejected with `reason`. See [`Promise::reject`].
    pub fn reject<T, E>(&self, reason: E) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.from_result(Err(reason))
    }

    /// Creates a promise already settled with `result`.
    pub fn from_result<T, E>(&self, result: Result<T, E>) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.promise(move |resolve, _| {
            resolve.resolve(result?);
            Ok(())
        })
    }

    /// Creates a promise from a [`Resolution`]: fulfilled right away for a
    /// plain value, settling like the thenable otherwise.
    pub fn resolve_with<T, E>(&self, resolution: Resolution<T, E>) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.promise(move |resolve, _| {
            resolve.resolve_with(resolution);
            Ok(())
        })
    }

    /// Creates a promise that settles exactly as `thenable` does.
    pub fn adopt<T, E, P>(&self, thenable: P) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        P: Thenable<T, E> + 'static,
    {
        self.resolve_with(Resolution::adopt(thenable))
    }

    /// Waits for every item to fulfill. See [`Promise::all`].
    pub fn all<T, E, I>(&self, items: I) -> Promise<Vec<T>, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let items: Vec<Resolution<T, E>> = items.into_iter().map(Into::into).collect();
        let total = items.len();
        if total == 0 {
            return self.resolve(Vec::new());
        }

        let (all, resolve, reject) = self.deferred();
        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; total]));
        let fulfilled = Rc::new(Cell::new(0usize));

        for (index, item) in items.into_iter().enumerate() {
            let (slots, fulfilled, resolve, reject) =
                (slots.clone(), fulfilled.clone(), resolve.clone(), reject.clone());
            self.resolve_with(item).then::<(), E, _, _>(
                move |value| {
                    slots.borrow_mut()[index] = Some(value);
                    fulfilled.set(fulfilled.get() + 1);
                    if fulfilled.get() == total {
                        trace!("all {} input(s) fulfilled", total);
                        let values = slots.borrow_mut().drain(..).flatten().collect();
                        resolve.resolve(values);
                    }
                    Ok(Resolution::Value(()))
                },
                move |reason| {
                    trace!("input {} rejected, rejecting the aggregate", index);
                    reject.reject(reason);
                    Ok(Resolution::Value(()))
                },
            );
        }
        all
    }

    /// Settles like whichever item settles first. See [`Promise::race`].
    pub fn race<T, E, I>(&self, items: I) -> Promise<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let (race, resolve, reject) = self.deferred();
        for item in items {
            let (resolve, reject) = (resolve.clone(), reject.clone());
            self.resolve_with(item.into()).then::<(), E, _, _>(
                move |value| {
                    resolve.resolve(value);
                    Ok(Resolution::Value(()))
                },
                move |reason| {
                    reject.reject(reason);
                    Ok(Resolution::Value(()))
                },
            );
        }
        race
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Creates a promise that immediately resolves to the given value.
    ///
    /// To adopt another promise instead, use [`adopt`](Self::adopt) or
    /// [`resolve_with`](Self::resolve_with).
    ///
    /// # Example
    /// ```
    /// # use thenable::Promise;
    /// let p = Promise::<_, ()>::resolve(123);
    /// assert_eq!(p.try_result(), Some(Ok(123)));
    /// ```
    pub fn resolve(value: T) -> Promise<T, E> {
        Runtime::current().resolve(value)
    }

    /// Creates a promise that immediately rejects with the given reason.
    ///
    /// # Example
    /// ```
    /// # use thenable::Promise;
    /// let p = Promise::<(), _>::reject("fail");
    /// assert_eq!(p.try_result(), Some(Err("fail")));
    /// ```
    pub fn reject(reason: E) -> Promise<T, E> {
        Runtime::current().reject(reason)
    }

    /// Creates a promise that immediately settles with the given result.
    ///
    /// # Example
    /// ```
    /// # use thenable::Promise;
    /// let p = Promise::<_, ()>::from_result(Ok(1));
    /// assert_eq!(p.try_result(), Some(Ok(1)));
    /// let p = Promise::<(), _>::from_result(Err("fail"));
    /// assert_eq!(p.try_result(), Some(Err("fail")));
    /// ```
    pub fn from_result(result: Result<T, E>) -> Promise<T, E> {
        Runtime::current().from_result(result)
    }

    /// Creates a promise from a [`Resolution`], adopting thenables.
    pub fn resolve_with(resolution: Resolution<T, E>) -> Promise<T, E> {
        Runtime::current().resolve_with(resolution)
    }

    /// Creates a promise that settles with the same status and value or
    /// reason as `thenable`.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let (inner, resolve, _) = Promise::<&str, ()>::deferred();
    /// let outer = Promise::<&str, ()>::adopt(inner);
    /// resolve.resolve("inner value");
    /// assert!(outer.is_pending());
    /// run_until_idle().unwrap();
    /// assert_eq!(outer.try_result(), Some(Ok("inner value")));
    /// ```
    pub fn adopt<P: Thenable<T, E> + 'static>(thenable: P) -> Promise<T, E> {
        Runtime::current().adopt(thenable)
    }

    /// Returns a promise that fulfills with every item's value, in input
    /// order, once all of them have fulfilled, or rejects with the first
    /// rejection.
    ///
    /// Items may be promises or plain [`Resolution::Value`]s. Inputs still
    /// running after a rejection are not cancelled; their results are
    /// discarded. An empty input fulfills with an empty vector.
    ///
    /// # Examples
    /// ## All succeed
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let ps: Vec<_> = (0..3).map(Promise::<_, ()>::resolve).collect();
    /// let all = Promise::<i32, ()>::all(ps);
    /// run_until_idle().unwrap();
    /// assert_eq!(all.try_result(), Some(Ok(vec![0, 1, 2])));
    /// ```
    ///
    /// ## With an error
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let all = Promise::<i32, &str>::all(vec![
    ///     Promise::resolve(1),
    ///     Promise::reject("fail"),
    ///     Promise::resolve(3),
    /// ]);
    /// run_until_idle().unwrap();
    /// assert_eq!(all.try_result(), Some(Err("fail")));
    /// ```
    pub fn all<I>(items: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        Runtime::current().all(items)
    }

    /// Returns a promise that settles, fulfilled or rejected, like whichever
    /// item settles first. Later settlements are ignored.
    ///
    /// An empty input never settles.
    ///
    /// # Example
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let (slow, _resolve_slow, _) = Promise::<i32, &str>::deferred();
    /// let (fast, _, reject_fast) = Promise::<i32, &str>::deferred();
    /// let race = Promise::<i32, &str>::race(vec![slow, fast]);
    /// reject_fast.reject("fast failure");
    /// run_until_idle().unwrap();
    /// assert_eq!(race.try_result(), Some(Err("fast failure")));
    /// ```
    pub fn race<I>(items: I) -> Promise<T, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        Runtime::current().race(items)
    }
}

/// Builds an already settled promise on the thread's default [`Runtime`].
///
/// # Example
/// ```
/// # use thenable::Promise;
/// let p: Promise<u8, &str> = Err("fail").into();
/// assert_eq!(p.try_result(), Some(Err("fail")));
/// ```
impl<T: Clone + 'static, E: Clone + 'static> From<Result<T, E>> for Promise<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Promise::from_result(result)
    }
}
