use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct BufferState {
    packets: VecDeque<Vec<u16>>,
    capacity: usize,
    data_available: bool,
    closed: bool,
}

/// Bounded packet queue shared by the poller (writer) and the consumer.
///
/// When full, the oldest packet is evicted to admit a new one. Every push
/// raises the data-available flag; draining clears it.
#[derive(Debug)]
pub struct StreamBuffer {
    state: Mutex<BufferState>,
    data_available: Condvar,
}

impl StreamBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BufferState {
                packets: VecDeque::with_capacity(capacity),
                capacity,
                data_available: false,
                closed: false,
            }),
            data_available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a packet, evicting the oldest one when at capacity.
    ///
    /// Returns the evicted packet, if any.
    pub fn push(&self, packet: Vec<u16>) -> Option<Vec<u16>> {
        let mut state = self.lock();
        if state.capacity == 0 {
            return Some(packet);
        }
        let evicted = if state.packets.len() >= state.capacity {
            state.packets.pop_front()
        } else {
            None
        };
        state.packets.push_back(packet);
        state.data_available = true;
        drop(state);

        self.data_available.notify_all();
        evicted
    }

    /// Remove and concatenate every buffered packet, oldest first.
    pub fn drain(&self) -> Vec<u16> {
        let mut state = self.lock();
        Self::take_all(&mut state)
    }

    /// Like [`drain`](Self::drain), but first block until data was pushed
    /// since the last drain or the buffer was closed.
    ///
    /// May return an empty vector if a concurrent drain got there first.
    pub fn wait_and_drain(&self) -> Vec<u16> {
        let state = self.lock();
        let mut state = self
            .data_available
            .wait_while(state, |state| !state.data_available && !state.closed)
            .unwrap_or_else(PoisonError::into_inner);
        Self::take_all(&mut state)
    }

    fn take_all(state: &mut BufferState) -> Vec<u16> {
        let total = state.packets.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(total);
        for packet in state.packets.drain(..) {
            data.extend(packet);
        }
        state.data_available = false;
        data
    }

    /// Wake every blocked [`wait_and_drain`](Self::wait_and_drain) for good.
    pub fn close(&self) {
        self.lock().closed = true;
        self.data_available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().packets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}
