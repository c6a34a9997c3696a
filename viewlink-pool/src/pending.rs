use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::connection::{Connect, PooledConnection};
use crate::error::AcquireError;
use crate::pool::{ConnectionPool, PoolInner};

/// Pool-side state of one queued connection request.
///
/// A slot is mutated exactly once: it is either bound to a connection or
/// cancelled, never both. Fulfilment and cancellation race freely; the
/// loser of the race observes the terminal state and backs off.
pub(crate) struct RequestSlot<T> {
    state: Mutex<SlotState<T>>,
}

enum SlotState<T> {
    /// Nothing bound yet; holds the waker of the awaiting task, if any.
    Waiting(Option<Waker>),
    /// A connection was bound and has not been collected yet.
    Ready(T),
    /// The request was cancelled before a connection could be bound.
    Cancelled(AcquireError),
    /// The awaiting task has collected the outcome.
    Finished,
}

impl<T> RequestSlot<T> {
    pub(crate) fn waiting() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Waiting(None)),
        })
    }

    pub(crate) fn ready(conn: T) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Ready(conn)),
        })
    }

    /// Attempt to bind `conn` to this slot.
    ///
    /// Returns the connection back to the caller if the slot already
    /// reached a terminal state, so it can be offered to the next slot.
    pub(crate) fn fulfil(&self, conn: T) -> Result<(), T> {
        let mut state = self.state.lock();
        match &mut *state {
            SlotState::Waiting(waker) => {
                let waker = waker.take();
                *state = SlotState::Ready(conn);
                drop(state);
                if let Some(waker) = waker {
                    waker.wake();
                }
                Ok(())
            },
            _ => Err(conn),
        }
    }

    /// Attempt to cancel this slot with the given reason.
    ///
    /// Idempotent: a slot which was already fulfilled or cancelled hands
    /// the reason back so the caller can deliver it elsewhere.
    pub(crate) fn cancel(&self, reason: AcquireError) -> Result<(), AcquireError> {
        let mut state = self.state.lock();
        match &mut *state {
            SlotState::Waiting(waker) => {
                let waker = waker.take();
                *state = SlotState::Cancelled(reason);
                drop(state);
                if let Some(waker) = waker {
                    waker.wake();
                }
                Ok(())
            },
            _ => Err(reason),
        }
    }

    /// Whether the slot is still waiting for a connection.
    pub(crate) fn is_waiting(&self) -> bool {
        matches!(&*self.state.lock(), SlotState::Waiting(_))
    }
}

/// A caller's handle to one queued connection request.
///
/// Resolves once the pool binds a connection to the request or cancels it.
/// The handle never blocks the calling thread; completion is driven by the
/// pool from connect and release events.
///
/// Dropping an unresolved handle cancels the request. Dropping a handle
/// whose request was already fulfilled returns the bound connection to the
/// pool so it is not lost.
pub struct ConnectionRequest<C>
where
    C: Connect,
{
    slot: Arc<RequestSlot<C::Connection>>,
    pool: Weak<PoolInner<C>>,
}

impl<C> ConnectionRequest<C>
where
    C: Connect,
{
    pub(crate) fn new(
        slot: Arc<RequestSlot<C::Connection>>,
        pool: Weak<PoolInner<C>>,
    ) -> Self {
        Self { slot, pool }
    }

    /// Cancel the request.
    ///
    /// Safe to call at any point; returns `false` if the request already
    /// completed (or was cancelled before), in which case nothing changes.
    pub fn cancel(&self) -> bool {
        self.slot.cancel(AcquireError::Cancelled).is_ok()
    }

    /// Whether a connection has already been bound to this request.
    pub fn is_fulfilled(&self) -> bool {
        matches!(&*self.slot.state.lock(), SlotState::Ready(_))
    }
}

impl<C> Future for ConnectionRequest<C>
where
    C: Connect,
{
    type Output = Result<PooledConnection<C>, AcquireError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut state = this.slot.state.lock();
        match mem::replace(&mut *state, SlotState::Finished) {
            SlotState::Waiting(_) => {
                *state = SlotState::Waiting(Some(cx.waker().clone()));
                Poll::Pending
            },
            SlotState::Ready(conn) => {
                Poll::Ready(Ok(PooledConnection::new(conn, this.pool.clone())))
            },
            SlotState::Cancelled(reason) => Poll::Ready(Err(reason)),
            // Polled again after completion; the future contract makes this
            // unreachable from well-behaved callers.
            SlotState::Finished => Poll::Pending,
        }
    }
}

impl<C> Drop for ConnectionRequest<C>
where
    C: Connect,
{
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        match mem::replace(&mut *state, SlotState::Finished) {
            SlotState::Waiting(_) => {
                *state = SlotState::Cancelled(AcquireError::Cancelled);
            },
            SlotState::Ready(conn) => {
                drop(state);
                if let Some(inner) = self.pool.upgrade() {
                    ConnectionPool::from_inner(inner).release(conn);
                }
            },
            _ => {},
        }
    }
}
