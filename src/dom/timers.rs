use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures_util::task::AtomicWaker;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

use crate::error::{BlissError, Result};

struct TimerEntry {
    callback: Box<dyn FnOnce()>,
    task: JoinHandle<()>,
}

/// One-shot timers. The runtime only sleeps and posts the id back; callbacks
/// run on the document thread when the queue is pumped.
pub(crate) struct TimerManager {
    next_id: RefCell<u32>,
    timers: RefCell<HashMap<u32, TimerEntry>>,
    fired_rx: RefCell<UnboundedReceiver<u32>>,
    fired_tx: UnboundedSender<u32>,
    pollers: Pollers,
}

/// Wakers of every deferred currently driving this queue.
type Pollers = Arc<Mutex<Vec<Weak<AtomicWaker>>>>;

fn wake_pollers(pollers: &Pollers) {
    let mut pollers = pollers.lock().unwrap_or_else(PoisonError::into_inner);
    pollers.retain(|poller| match poller.upgrade() {
        Some(waker) => {
            waker.wake();
            true
        }
        None => false,
    });
}

impl TimerManager {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            next_id: RefCell::new(1),
            timers: RefCell::new(HashMap::new()),
            fired_rx: RefCell::new(rx),
            fired_tx: tx,
            pollers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn next_id(&self) -> u32 {
        let mut id_ref = self.next_id.borrow_mut();
        let id = *id_ref;
        *id_ref = id.wrapping_add(1).max(1);
        id
    }

    /// Track `waker` until its owner drops it; each fired timer wakes it.
    pub(crate) fn add_poller(&self, waker: &Arc<AtomicWaker>) {
        let mut pollers = self.pollers.lock().unwrap_or_else(PoisonError::into_inner);
        pollers.retain(|poller| poller.strong_count() > 0);
        pollers.push(Arc::downgrade(waker));
    }

    pub(crate) fn has_active_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    pub(crate) fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Result<u32> {
        let handle = Handle::try_current().map_err(|_| BlissError::NoRuntime)?;
        let id = self.next_id();

        let tx = self.fired_tx.clone();
        let pollers = Arc::clone(&self.pollers);
        let task = handle.spawn(async move {
            sleep(delay).await;
            if tx.send(id).is_ok() {
                wake_pollers(&pollers);
            }
        });

        trace!(target: "bliss::timers", id, delay_ms = delay.as_millis() as u64, "timer scheduled");
        self.timers
            .borrow_mut()
            .insert(id, TimerEntry { callback, task });
        Ok(id)
    }

    pub(crate) fn clear_timeout(&self, id: u32) {
        if let Some(entry) = self.timers.borrow_mut().remove(&id) {
            entry.task.abort();
            trace!(target: "bliss::timers", id, "timer cleared");
        }
    }

    /// Run every timer that has fired since the last call.
    pub(crate) fn run_due(&self) -> bool {
        let mut fired = Vec::new();
        {
            let mut rx = self.fired_rx.borrow_mut();
            while let Ok(id) = rx.try_recv() {
                fired.push(id);
            }
        }

        let mut ran = false;
        for id in fired {
            // Cleared timers may still have posted their id.
            let Some(entry) = self.timers.borrow_mut().remove(&id) else {
                continue;
            };
            trace!(target: "bliss::timers", id, "timer fired");
            (entry.callback)();
            ran = true;
        }
        ran
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        for (_, entry) in self.timers.get_mut().drain() {
            entry.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn scheduling_without_runtime_fails() {
        let timers = TimerManager::new();
        assert_eq!(
            timers.set_timeout(Duration::from_millis(1), Box::new(|| {})),
            Err(BlissError::NoRuntime)
        );
    }

    #[tokio::test]
    async fn fires_once_after_delay() {
        let timers = TimerManager::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        timers
            .set_timeout(
                Duration::from_millis(5),
                Box::new(move || counter.set(counter.get() + 1)),
            )
            .unwrap();

        assert!(!timers.run_due());
        sleep(Duration::from_millis(30)).await;
        assert!(timers.run_due());
        assert!(!timers.run_due());
        assert_eq!(hits.get(), 1);
        assert!(!timers.has_active_timers());
    }

    #[tokio::test]
    async fn fired_timer_wakes_every_poller() {
        let timers = TimerManager::new();
        let first = Arc::new(AtomicWaker::new());
        let second = Arc::new(AtomicWaker::new());
        timers.add_poller(&first);
        timers.add_poller(&second);
        timers.add_poller(&Arc::new(AtomicWaker::new()));

        timers
            .set_timeout(Duration::from_millis(5), Box::new(|| {}))
            .unwrap();
        sleep(Duration::from_millis(30)).await;
        // Dropped pollers are pruned when the timer fires.
        assert_eq!(timers.pollers.lock().unwrap().len(), 2);
        assert!(timers.run_due());
    }

    #[tokio::test]
    async fn cleared_timer_never_runs() {
        let timers = TimerManager::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = timers
            .set_timeout(
                Duration::from_millis(5),
                Box::new(move || counter.set(counter.get() + 1)),
            )
            .unwrap();
        timers.clear_timeout(id);

        sleep(Duration::from_millis(30)).await;
        assert!(!timers.run_due());
        assert_eq!(hits.get(), 0);
    }
}
