//! Observing a promise from outside the reaction chain.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use oneshot::TryRecvError;

use crate::{promise::Promise, Error};

/// The eventual outcome of a [`Promise`], delivered over a oneshot channel.
///
/// Created by [`Promise::settled`]. Can be polled without blocking through
/// [`try_take`](Self::try_take), or awaited as a [`Future`]. Either way, the
/// outcome only arrives once the promise's runtime has run the reaction that
/// sends it.
///
/// If every [`Promise`], [`Resolver`](crate::Resolver) and
/// [`Rejecter`](crate::Rejecter) handle for a pending promise is dropped, no
/// outcome can ever arrive and the observer reports [`Error::Abandoned`].
pub struct Settled<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Settled<T, E> {
    /// Takes the outcome if it has arrived.
    ///
    /// Returns `Ok(None)` while the outcome is still on its way.
    ///
    /// The outcome can be taken once. Later calls report
    /// [`Error::Abandoned`] even though the promise itself stays settled; use
    /// [`Promise::try_result`] to read it again.
    pub fn try_take(&mut self) -> Result<Option<Result<T, E>>, Error> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::Abandoned),
        }
    }
}

impl<T, E> fmt::Debug for Settled<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled").finish_non_exhaustive()
    }
}

impl<T, E> Future for Settled<T, E> {
    type Output = Result<Result<T, E>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.map_err(|_| Error::Abandoned))
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Returns an observer for this promise's outcome.
    ///
    /// # Examples
    /// ## Polling
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let p = Promise::<_, ()>::resolve(7);
    /// let mut settled = p.settled();
    /// assert_eq!(settled.try_take(), Ok(None));
    /// run_until_idle().unwrap();
    /// assert_eq!(settled.try_take(), Ok(Some(Ok(7))));
    /// ```
    ///
    /// ## Awaiting
    /// ```
    /// # use thenable::{run_until_idle, Promise};
    /// let p = Promise::<(), _>::reject("fail");
    /// let settled = p.settled();
    /// run_until_idle().unwrap();
    /// assert_eq!(futures::executor::block_on(settled), Ok(Err("fail")));
    /// ```
    pub fn settled(&self) -> Settled<T, E> {
        let (tx, rx) = oneshot::channel();
        self.attach(Box::new(move |outcome| {
            // Nobody listening is fine.
            let _ = tx.send(outcome);
        }));
        Settled { rx }
    }
}
