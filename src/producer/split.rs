//! # Split Handshake
//!
//! A consumer asks the producer to switch outputs at the next split point and
//! blocks until it happens. Requests are served in order; each carries its
//! own single-slot signal which the producer fills with the descriptor of the
//! frame the new output starts on.
//!
//! ```text
//! consumer                         producer
//!    │ request(target) ──▶ [r0][r1] ...
//!    │ ticket.wait(timeout)         │ split point: take_next() → r0
//!    │                              │ swap outputs
//!    │ ◀──────── descriptor ──────── resolver.resolve(frame)
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::SplitConfig;
use crate::core::frame_index::FrameDescriptor;
use crate::error::{BufferError, BufferResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Claimed,
    Resolved(FrameDescriptor),
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        })
    }

    fn set(&self, state: SlotState) {
        *self.state.lock() = state;
        self.ready.notify_all();
    }
}

struct PendingSplit<T> {
    target: T,
    slot: Arc<Slot>,
}

/// Queue of split requests shared between consumers and the producer.
pub struct SplitController<T> {
    config: SplitConfig,
    queue: Mutex<VecDeque<PendingSplit<T>>>,
    key_frame_requested: AtomicBool,
}

impl<T> SplitController<T> {
    pub fn new(config: SplitConfig) -> Self {
        Self {
            config,
            queue: Mutex::new(VecDeque::new()),
            key_frame_requested: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Queues a request to switch to `target` and returns the ticket to wait
    /// on. With an intra period above one, a key frame is also requested so
    /// the split point arrives early.
    pub fn request(&self, target: T) -> SplitTicket {
        let slot = Slot::new();
        let queued = {
            let mut queue = self.queue.lock();
            prune_abandoned(&mut queue);
            queue.push_back(PendingSplit {
                target,
                slot: Arc::clone(&slot),
            });
            queue.len()
        };
        if self.config.needs_key_frame_request() {
            self.key_frame_requested.store(true, Ordering::Release);
        }
        debug!(queued, "split requested");
        SplitTicket { slot }
    }

    /// Requests a split and blocks until it happens or the configured split
    /// timeout elapses.
    pub fn split(&self, target: T) -> BufferResult<FrameDescriptor> {
        self.request(target).wait(self.config.split_timeout())
    }

    /// Takes the oldest live request, skipping any whose caller gave up.
    /// Called by the producer at each split-eligible boundary.
    pub fn take_next(&self) -> Option<(T, SplitResolver)> {
        let mut queue = self.queue.lock();
        while let Some(pending) = queue.pop_front() {
            let mut state = pending.slot.state.lock();
            if *state == SlotState::Pending {
                *state = SlotState::Claimed;
                drop(state);
                return Some((
                    pending.target,
                    SplitResolver {
                        slot: Some(pending.slot),
                    },
                ));
            }
        }
        None
    }

    /// Clears and returns the pending key frame request.
    pub fn take_key_frame_request(&self) -> bool {
        self.key_frame_requested.swap(false, Ordering::AcqRel)
    }

    /// Requests still waiting for a split point. Abandoned requests are
    /// dropped from the queue and not counted.
    pub fn pending(&self) -> usize {
        let mut queue = self.queue.lock();
        prune_abandoned(&mut queue);
        queue.len()
    }
}

fn prune_abandoned<T>(queue: &mut VecDeque<PendingSplit<T>>) {
    queue.retain(|pending| *pending.slot.state.lock() == SlotState::Pending);
}

/// Consumer half of one split request.
#[derive(Debug)]
pub struct SplitTicket {
    slot: Arc<Slot>,
}

impl SplitTicket {
    /// Blocks until the producer performs the split.
    ///
    /// # Errors
    ///
    /// `Timeout` if no split point is reached within `timeout`; the request
    /// is withdrawn and the producer will skip it. `Closed` if the producer
    /// dropped the request after claiming it.
    pub fn wait(self, timeout: Duration) -> BufferResult<FrameDescriptor> {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        loop {
            let current = *state;
            match current {
                SlotState::Resolved(frame) => return Ok(frame),
                SlotState::Cancelled => return Err(BufferError::closed("split")),
                SlotState::Claimed => {
                    // the producer resolves or drops a claimed request promptly
                    self.slot.ready.wait(&mut state);
                }
                SlotState::Pending => {
                    if self.slot.ready.wait_until(&mut state, deadline).timed_out()
                        && *state == SlotState::Pending
                    {
                        *state = SlotState::Cancelled;
                        let duration_ms = timeout.as_millis() as u64;
                        warn!(duration_ms, "timed out waiting for a split point");
                        return Err(BufferError::timeout("split", duration_ms));
                    }
                }
            }
        }
    }

    /// Non-blocking check: the split descriptor, if it has happened.
    pub fn try_get(&self) -> Option<FrameDescriptor> {
        match *self.slot.state.lock() {
            SlotState::Resolved(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Producer half of a claimed split request. Dropping it unresolved releases
/// the waiting consumer with an error.
#[derive(Debug)]
pub struct SplitResolver {
    slot: Option<Arc<Slot>>,
}

impl SplitResolver {
    pub fn resolve(mut self, frame: FrameDescriptor) {
        if let Some(slot) = self.slot.take() {
            slot.set(SlotState::Resolved(frame));
        }
    }
}

impl Drop for SplitResolver {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.set(SlotState::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn descriptor(index: u64) -> FrameDescriptor {
        FrameDescriptor {
            index,
            complete: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_requests_are_fifo() {
        let splits = SplitController::new(SplitConfig::default());
        let first = splits.request("a");
        let second = splits.request("b");
        assert_eq!(splits.pending(), 2);

        let (target, resolver) = splits.take_next().unwrap();
        assert_eq!(target, "a");
        resolver.resolve(descriptor(3));
        assert_eq!(first.try_get().unwrap().index, 3);
        assert!(second.try_get().is_none());

        let (target, _resolver) = splits.take_next().unwrap();
        assert_eq!(target, "b");
        assert!(splits.take_next().is_none());
    }

    #[test]
    fn test_wait_across_threads() {
        let splits = Arc::new(SplitController::new(SplitConfig::default()));
        let ticket = splits.request(1u32);
        let producer = {
            let splits = Arc::clone(&splits);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                let (_, resolver) = splits.take_next().unwrap();
                resolver.resolve(descriptor(9));
            })
        };
        let frame = ticket.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.index, 9);
        producer.join().unwrap();
    }

    #[test]
    fn test_timeout_withdraws_request() {
        let splits = SplitController::new(SplitConfig::default());
        let ticket = splits.request(());
        let err = ticket.wait(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.category(), "timeout");
        assert_eq!(splits.pending(), 0);
        assert!(splits.take_next().is_none());
    }

    #[test]
    fn test_abandoned_requests_do_not_accumulate() {
        let splits = SplitController::new(SplitConfig::default());
        for _ in 0..5 {
            let ticket = splits.request(());
            assert!(ticket.wait(Duration::from_millis(1)).is_err());
        }
        let _live = splits.request(());
        assert_eq!(splits.queue.lock().len(), 1);
        assert_eq!(splits.pending(), 1);
    }

    #[test]
    fn test_dropped_resolver_releases_waiter() {
        let splits = SplitController::new(SplitConfig::default());
        let ticket = splits.request(());
        drop(splits.take_next());
        let err = ticket.wait(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.category(), "closed");
    }

    #[test]
    fn test_key_frame_request_flag() {
        let splits = SplitController::new(SplitConfig::new(30, 30.0));
        assert!(!splits.take_key_frame_request());
        let _ticket = splits.request(());
        assert!(splits.take_key_frame_request());
        assert!(!splits.take_key_frame_request());

        let every_frame = SplitController::new(SplitConfig::new(1, 30.0));
        let _ticket = every_frame.request(());
        assert!(!every_frame.take_key_frame_request());
    }
}
