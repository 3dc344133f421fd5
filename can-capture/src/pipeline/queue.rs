//! Bounded frame queue with drop-oldest admission
//!
//! A fixed-capacity crossbeam channel whose producer can evict the oldest
//! queued frame to admit a new one. The bound is the channel's, so the queue
//! can never grow past its capacity regardless of how it is used.

use crate::types::Frame;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

pub struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    capacity: usize,
}

impl FrameQueue {
    /// Create a queue; a capacity of 0 is raised to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueue without blocking
    ///
    /// When the queue is full the oldest frame is removed and returned so the
    /// caller can account for the drop.
    pub fn push_evicting(&self, mut frame: Frame) -> Option<Frame> {
        let mut evicted = None;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(rejected)) => {
                    frame = rejected;
                    // The consumer may have taken a frame in the meantime,
                    // in which case the retry succeeds without eviction.
                    if let Ok(oldest) = self.rx.try_recv() {
                        evicted = Some(oldest);
                    }
                }
                Err(TrySendError::Disconnected(_)) => unreachable!("frame queue owns both ends"),
            }
        }
    }

    /// Dequeue, waiting at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Discard all queued frames; returns how many were removed
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
