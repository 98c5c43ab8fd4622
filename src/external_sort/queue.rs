use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

use crate::error::SortError;

/// Bounded blocking queue with an explicit close.
///
/// Producers block in [`push`](ClosableQueue::push) while the queue is full. Once
/// closed, pushes fail and [`pop`](ClosableQueue::pop) drains what is left and then
/// returns `None` instead of blocking.
pub struct ClosableQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Returned by a push into a closed queue, handing the rejected item back.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

impl<T> ClosableQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Blocks while the queue is full and open.
    pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.state.lock();
        while !state.closed && state.items.len() >= self.capacity {
            self.not_full.wait(&mut state);
        }
        self.push_locked(&mut state, item)
    }

    fn push_locked(&self, state: &mut QueueState<T>, item: T) -> Result<(), QueueClosed<T>> {
        if state.closed {
            return Err(QueueClosed(item));
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocks while the queue is empty and open. `None` means closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Rejects further pushes and wakes every waiting producer and consumer.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Closes the queue and discards anything still buffered.
    pub fn abort(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let dropped = state.items.len();
        state.items.clear();
        self.not_empty.notify_all();
        self.not_full.notify_all();
        dropped
    }
}

/// Where the sort engine pulls its unsorted lines from.
pub trait LineSource {
    /// `Ok(None)` signals that the input is exhausted.
    fn next_line(&mut self) -> Result<Option<String>, SortError>;

    /// Called when the sort fails so producers feeding the source are released.
    fn abort(&mut self) {}
}

impl LineSource for &ClosableQueue<String> {
    fn next_line(&mut self) -> Result<Option<String>, SortError> {
        Ok(self.pop())
    }

    fn abort(&mut self) {
        ClosableQueue::abort(*self);
    }
}

/// Adapts any iterator of lines, mostly for tests and for sorting in-memory input.
pub struct IterSource<I>(pub I);

impl<I> LineSource for IterSource<I>
where
    I: Iterator<Item = String>,
{
    fn next_line(&mut self) -> Result<Option<String>, SortError> {
        Ok(self.0.next())
    }
}
