//! Ordered delivery queue.
//!
//! Unbounded, multi-producer, single-consumer, strict FIFO. The consumer
//! half is a separate non-clonable type, so "exactly one consumer" is
//! enforced by ownership rather than convention. A rate-limit requeue is an
//! ordinary `push` — it lands at the tail and occupies a brand-new slot.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

struct Shared {
    state: Mutex<State>,
    available: Notify,
}

struct State {
    entries: VecDeque<PathBuf>,
    /// Whether an entry has been popped but not yet acked.
    in_flight: bool,
}

/// The delivery queue. Use [`DeliveryQueue::new`] to obtain the two halves.
pub struct DeliveryQueue;

impl DeliveryQueue {
    /// Creates an empty queue, returning the producer and consumer halves.
    pub fn new() -> (Producer, Consumer) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                entries: VecDeque::new(),
                in_flight: false,
            }),
            available: Notify::new(),
        });
        (
            Producer {
                shared: Arc::clone(&shared),
            },
            Consumer { shared },
        )
    }
}

/// Producer half: any number of tasks may push.
#[derive(Clone)]
pub struct Producer {
    shared: Arc<Shared>,
}

impl Producer {
    /// Appends an entry to the tail. Never blocks.
    pub fn push(&self, entry: PathBuf) {
        let mut state = self.shared.state.lock().unwrap();
        tracing::debug!(path = %entry.display(), depth = state.entries.len() + 1, "queued");
        state.entries.push_back(entry);
        drop(state);
        self.shared.available.notify_one();
    }

    /// Returns the number of entries currently waiting (excludes in-flight).
    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().entries.len()
    }

    /// Returns `true` if no entries are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer half: exactly one exists per queue.
pub struct Consumer {
    shared: Arc<Shared>,
}

impl Consumer {
    /// Suspends until an entry is available, then removes and returns the
    /// head of the queue. The entry is in flight until [`ack`](Self::ack).
    pub async fn pop(&mut self) -> PathBuf {
        loop {
            // Register interest before checking, so a push between the check
            // and the await cannot be lost.
            let notified = self.shared.available.notified();
            {
                let mut state = self.shared.state.lock().unwrap();
                if let Some(entry) = state.entries.pop_front() {
                    state.in_flight = true;
                    return entry;
                }
            }
            notified.await;
        }
    }

    /// Marks the most recently popped entry as done.
    ///
    /// Success, hard failure, and requeue-after-rate-limit all count as done
    /// for a pop cycle; a requeue is a new `push`, not the same slot.
    pub fn ack(&mut self) {
        self.shared.state.lock().unwrap().in_flight = false;
    }

    /// Returns whether an entry is popped but not yet acked.
    pub fn in_flight(&self) -> bool {
        self.shared.state.lock().unwrap().in_flight
    }
}
