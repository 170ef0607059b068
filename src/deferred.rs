use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::task::AtomicWaker;
use tokio::sync::oneshot;

use crate::dom::timers::TimerManager;
use crate::error::{BlissError, Result};

type Sender<T> = Rc<RefCell<Option<oneshot::Sender<Result<T>>>>>;

/// Single-shot asynchronous result. There is no cancellation: dropping the
/// `Deferred` only discards the value.
pub struct Deferred<T> {
    receiver: oneshot::Receiver<Result<T>>,
    sender: Weak<RefCell<Option<oneshot::Sender<Result<T>>>>>,
    driver: Option<TimerDriver>,
}

struct TimerDriver {
    timers: Rc<TimerManager>,
    waker: Arc<AtomicWaker>,
}

/// Settles the paired [`Deferred`]. Only the first resolve or reject counts.
pub struct Resolver<T> {
    sender: Sender<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Rc::clone(&self.sender),
        }
    }
}

impl<T> Deferred<T> {
    pub fn new() -> (Self, Resolver<T>) {
        let (tx, rx) = oneshot::channel();
        let sender = Rc::new(RefCell::new(Some(tx)));
        (
            Self {
                receiver: rx,
                sender: Rc::downgrade(&sender),
                driver: None,
            },
            Resolver { sender },
        )
    }

    pub fn resolved(value: T) -> Self {
        let (deferred, resolver) = Self::new();
        resolver.resolve(value);
        deferred
    }

    pub fn rejected(error: BlissError) -> Self {
        let (deferred, resolver) = Self::new();
        resolver.reject(error);
        deferred
    }

    /// Pump `timers` whenever this deferred is polled, so awaiting it is
    /// enough to observe timer-driven settlement. Every fired timer wakes the
    /// task currently awaiting this deferred.
    pub(crate) fn driven_by(mut self, timers: Rc<TimerManager>) -> Self {
        let waker = Arc::new(AtomicWaker::new());
        timers.add_poller(&waker);
        self.driver = Some(TimerDriver { timers, waker });
        self
    }

    /// True once a resolver has settled, or every resolver is gone.
    pub fn is_settled(&self) -> bool {
        self.sender
            .upgrade()
            .map_or(true, |sender| sender.borrow().is_none())
    }
}

impl<T> Resolver<T> {
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(&self, error: BlissError) {
        self.settle(Err(error));
    }

    pub fn is_settled(&self) -> bool {
        self.sender.borrow().is_none()
    }

    fn settle(&self, outcome: Result<T>) {
        let Some(tx) = self.sender.borrow_mut().take() else {
            return;
        };
        // The receiver may already be gone; the value is simply discarded.
        let _ = tx.send(outcome);
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(driver) = &this.driver {
            // Register before draining so a timer posting in between still wakes us.
            driver.waker.register(cx.waker());
            while driver.timers.run_due() {}
        }

        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(BlissError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    #[test]
    fn first_settlement_wins() {
        let (deferred, resolver) = Deferred::new();
        resolver.resolve(1);
        resolver.resolve(2);
        resolver.reject(BlissError::Detached);
        assert_eq!(deferred.now_or_never(), Some(Ok(1)));
    }

    #[test]
    fn pending_until_resolved() {
        let (mut deferred, resolver) = Deferred::<&str>::new();
        assert!((&mut deferred).now_or_never().is_none());
        assert!(!deferred.is_settled());
        resolver.resolve("done");
        assert!(deferred.is_settled());
        assert_eq!(deferred.now_or_never(), Some(Ok("done")));
    }

    #[test]
    fn rejection_carries_error() {
        let deferred = Deferred::<()>::rejected(BlissError::NoRuntime);
        assert_eq!(deferred.now_or_never(), Some(Err(BlissError::NoRuntime)));
    }

    #[test]
    fn dropped_resolver_rejects() {
        let (deferred, resolver) = Deferred::<u8>::new();
        let copy = resolver.clone();
        drop(resolver);
        assert!(!deferred.is_settled());
        drop(copy);
        assert!(deferred.is_settled());
        assert_eq!(deferred.now_or_never(), Some(Err(BlissError::Abandoned)));
    }

    #[tokio::test]
    async fn awaiting_wakes_on_resolve() {
        let (deferred, resolver) = Deferred::new();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                tokio::task::spawn_local(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    resolver.resolve(42);
                });
                assert_eq!(deferred.await, Ok(42));
            })
            .await;
    }
}
