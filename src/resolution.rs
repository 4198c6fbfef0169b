use std::fmt;

use crate::promise::{Promise, Rejecter, Resolver};

/// What a reaction callback hands back: `Ok` with a [`Resolution`], or `Err`
/// with the reason the derived promise is rejected with.
pub type Outcome<T, E> = Result<Resolution<T, E>, E>;

/// A value a promise can be resolved with: either a plain value, or
/// something promise-like whose eventual settlement is adopted.
pub enum Resolution<T, E> {
    /// Fulfill with this value.
    Value(T),
    /// Settle exactly as this thenable settles.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wraps any [`Thenable`] for adoption.
    pub fn adopt<P: Thenable<T, E> + 'static>(thenable: P) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }

    /// Returns `true` for [`Resolution::Thenable`].
    pub fn is_thenable(&self) -> bool {
        matches!(self, Resolution::Thenable(_))
    }
}

impl<T: Clone + 'static, E: Clone + 'static> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::adopt(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// A promise-like value: anything that can report an eventual settlement to a
/// pair of settlement capabilities.
///
/// [`Promise`] is the canonical implementation. Implementations should call
/// one of the two capabilities once, either right away or at any later point.
/// Extra calls are ignored by the receiving promise.
///
/// Adopting a thenable that (directly or through a chain) adopts the very
/// promise it is meant to settle is a usage error. It is not detected; the
/// promise simply never settles.
pub trait Thenable<T, E> {
    /// Forwards the eventual settlement to `resolve` or `reject`.
    fn subscribe(self: Box<Self>, resolve: Resolver<T, E>, reject: Rejecter<T, E>);
}
