//! Status fetch seam between the poller and a control-plane API

use crate::error::Retryable;
use crate::status::Observation;
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;

/// Queries the current status of the operation identified by a handle
///
/// `Ok(None)` means the handle no longer resolves to any status record.
#[async_trait]
pub trait StatusFetcher<H: ?Sized + Sync>: Send + Sync {
    type Output: Observation + Send;
    type Error: Retryable + Display + Send;

    async fn fetch(&self, handle: &H) -> Result<Option<Self::Output>, Self::Error>;
}

/// [`StatusFetcher`] backed by a closure, see [`fetch_fn`]
pub struct FnFetcher<F, T, E> {
    f: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Wrap a closure returning a future as a [`StatusFetcher`]
///
/// The returned future must not borrow the handle or the closure; copy what
/// it needs first.
pub fn fetch_fn<H, F, Fut, T, E>(f: F) -> FnFetcher<F, T, E>
where
    H: ?Sized,
    F: Fn(&H) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    FnFetcher {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<H, F, Fut, T, E> StatusFetcher<H> for FnFetcher<F, T, E>
where
    H: ?Sized + Sync,
    F: Fn(&H) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    T: Observation + Send,
    E: Retryable + Display + Send,
{
    type Output = T;
    type Error = E;

    async fn fetch(&self, handle: &H) -> Result<Option<T>, E> {
        (self.f)(handle).await
    }
}
