//! Suspendable token producers, used to lift sequential transformer logic
//! onto `futures::Stream` pipelines.
//!
//! A coroutine is an asynchronous function handed a [`Suspend`] instance.
//! Each `yield_` parks the function until the stream's consumer polls again,
//! so a producer that inflates one input into many outputs never outruns its
//! consumer: the suspension point *is* the backpressure wait, and the next
//! poll is the flow signal that resumes it. [`Suspend::yield_all`] and
//! [`Suspend::yield_stream`] push entire synchronous or asynchronous
//! sequences under the same discipline.

use std::{
    cell::UnsafeCell,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// Start a coroutine from the provided asynchronous function, returning a
/// `futures::Stream` of its yielded values.
pub fn coroutine<Fut, Yield>(
    fut: impl FnOnce(Suspend<Yield>) -> Fut,
) -> Coroutine<Fut, Yield>
where
    Fut: Future,
{
    let mailbox = Arc::new(Mailbox {
        slot: UnsafeCell::new(None),
    });
    let fut = fut(Suspend {
        mailbox: mailbox.clone(),
    });
    Coroutine { mailbox, fut }
}

/// Start a fallible coroutine. The returned stream yields `Ok` items for
/// each yielded value; if the function completes with `Err`, that error is
/// surfaced as the final stream item.
pub fn try_coroutine<Fut, Yield, Error>(
    fut: impl FnOnce(Suspend<Yield>) -> Fut,
) -> TryCoroutine<Fut, Yield>
where
    Fut: Future<Output = Result<(), Error>>,
{
    TryCoroutine {
        inner: coroutine(fut),
    }
}

pin_project_lite::pin_project! {
    /// A suspendable producer driven by polls of its `futures::Stream` face.
    pub struct Coroutine<Fut, Yield> {
        mailbox: Arc<Mailbox<Yield>>,
        #[pin]
        fut: Fut,
    }
}

pin_project_lite::pin_project! {
    /// A [`Coroutine`] whose function returns `Result`, mapped onto a
    /// `TryStream`.
    pub struct TryCoroutine<Fut, Yield> {
        #[pin]
        inner: Coroutine<Fut, Yield>,
    }
}

/// Passed by value into a coroutine's function; the handle through which it
/// yields values downstream.
pub struct Suspend<Yield> {
    mailbox: Arc<Mailbox<Yield>>,
}

/// Shared between a Coroutine and the Suspend passed into its future. Though
/// contained by an Arc, these are the only two references that exist, and
/// both are only touched from polls holding `&mut` on the Coroutine.
struct Mailbox<Yield> {
    slot: UnsafeCell<Option<Yield>>,
}

// Safety: all access is funneled through polling functions which require an
// exclusive reference to the owning Coroutine.
unsafe impl<Y: Send> Sync for Mailbox<Y> {}

impl<Yield> Suspend<Yield> {
    /// Yield one value downstream, suspending until the consumer pulls it.
    pub async fn yield_(&mut self, item: Yield) {
        {
            // Safety: we are within a poll of the owning Coroutine, reached
            // through its `&mut self`.
            let slot = unsafe { &mut *self.mailbox.slot.get() };
            assert!(
                slot.is_none(),
                "yield_ holds &mut self, so it cannot be re-entered without awaiting"
            );
            *slot = Some(item);
        }
        // Pending here parks the coroutine; the consumer taking the slot and
        // polling again is what resumes it. No waker is needed because the
        // coroutine is only ever polled by its own stream.
        std::future::poll_fn(|_| {
            // Safety: as above.
            if unsafe { (*self.mailbox.slot.get()).is_some() } {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await
    }

    /// Yield every item of a synchronous sequence, suspending between items.
    /// The downstream buffer dictates the pace: one item per pull.
    pub async fn yield_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = Yield>,
    {
        for item in items {
            self.yield_(item).await;
        }
    }

    /// Drain an asynchronous producer downstream under the same suspension
    /// discipline, returning its terminal result. An `Err` item ends the
    /// drain and is returned to the caller.
    pub async fn yield_stream<S, Error>(&mut self, source: S) -> Result<(), Error>
    where
        S: futures_core::Stream<Item = Result<Yield, Error>>,
    {
        let mut source = std::pin::pin!(source);
        loop {
            let next = std::future::poll_fn(|cx| source.as_mut().poll_next(cx)).await;
            match next {
                Some(Ok(item)) => self.yield_(item).await,
                Some(Err(error)) => return Err(error),
                None => return Ok(()),
            }
        }
    }
}

impl<Fut, Yield> futures_core::Stream for Coroutine<Fut, Yield>
where
    Fut: Future<Output = ()>,
{
    type Item = Yield;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.project();
        match me.fut.poll(cx) {
            Poll::Ready(()) => Poll::Ready(None),
            Poll::Pending => {
                // Safety: the future just returned; ours is the only live
                // reference to the mailbox.
                if let Some(item) = unsafe { (&mut *me.mailbox.slot.get()).take() } {
                    Poll::Ready(Some(item))
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

impl<Fut, Yield, Error> futures_core::Stream for TryCoroutine<Fut, Yield>
where
    Fut: Future<Output = Result<(), Error>>,
{
    type Item = Result<Yield, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.project().inner.project();
        match me.fut.poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(None),
            Poll::Ready(Err(error)) => Poll::Ready(Some(Err(error))),
            Poll::Pending => {
                // Safety: as in Coroutine::poll_next.
                if let Some(item) = unsafe { (&mut *me.mailbox.slot.get()).take() } {
                    Poll::Ready(Some(Ok(item)))
                } else {
                    Poll::Pending
                }
            }
        }
    }
}
