//! Bounded, thread-safe FIFO used to hand events from collaborator threads to
//! the render loop.
//!
//! Producers hold an [`InboxSender`]; the render loop owns the [`Inbox`] and
//! drains it at frame boundaries. Key properties:
//! - Arrival order is preserved.
//! - Backpressure rejects the newest item; the rejection is counted so the
//!   loop can report it.
//! - Draining takes everything queued at that instant in one lock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InboxFull {
    pub capacity: usize,
}

impl std::fmt::Display for InboxFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inbox full (capacity {})", self.capacity)
    }
}

impl std::error::Error for InboxFull {}

#[derive(Debug)]
struct Slots<T> {
    items: VecDeque<T>,
    capacity: usize,
    overflowed: u64,
}

#[derive(Debug)]
pub struct Inbox<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Inbox<T> {
    /// A zero capacity is bumped to 1 so the inbox can always make progress.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity),
                capacity,
                overflowed: 0,
            })),
        }
    }

    pub fn sender(&self) -> InboxSender<T> {
        InboxSender {
            slots: Arc::clone(&self.slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.slots.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns everything queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut slots = self.slots.lock();
        slots.items.drain(..).collect()
    }

    /// Returns the number of rejected sends since the last call and resets it.
    pub fn take_overflow(&self) -> u64 {
        std::mem::take(&mut self.slots.lock().overflowed)
    }
}

#[derive(Debug)]
pub struct InboxSender<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Clone for InboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> InboxSender<T> {
    pub fn try_send(&self, item: T) -> Result<(), InboxFull> {
        let mut slots = self.slots.lock();
        if slots.items.len() >= slots.capacity {
            slots.overflowed += 1;
            return Err(InboxFull {
                capacity: slots.capacity,
            });
        }
        slots.items.push_back(item);
        Ok(())
    }
}
