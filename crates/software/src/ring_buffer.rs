//! Provides [`RingBuffer`], a fixed-capacity circular byte queue shared between an interrupt source and task context.
//!
//! Each buffer is expected to have a single writer and a single reader (e.g., for the receive direction the serial
//! interrupt writes and the polling task reads). Every access to the indices happens inside a critical section, so the
//! two sides never observe a half-updated `head`/`tail`/`size` triple.

use core::cell::RefCell;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

/// Default capacity of the serial buffers, matching the 8-bit index space of the floor controller's UART buffers.
pub const DEFAULT_CAPACITY: usize = 256;

/// Returned by [`RingBuffer::try_put`] when the buffer has no room left. Callers retry or drop the byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Full;

/// Returned by [`RingBuffer::try_get`] and [`RingBuffer::peek`] when there is nothing to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Empty;

struct Inner<const N: usize> {
    data: [u8; N],
    head: usize,
    tail: usize,
    size: usize,
}

impl<const N: usize> Inner<N> {
    fn push(&mut self, byte: u8) {
        self.data[self.head] = byte;
        self.head = (self.head + 1) % N;
        self.size += 1;
    }
}

/// A circular byte queue which never overwrites unread data.
pub struct RingBuffer<const N: usize = DEFAULT_CAPACITY> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<N>>>,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    /// Constructs an empty buffer. This is a `const fn` so buffers may live in `static`s.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                data: [0; N],
                head: 0,
                tail: 0,
                size: 0,
            })),
        }
    }

    /// Total number of bytes the buffer can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Appends a byte, or returns [`Full`] if there is no room.
    pub fn try_put(&self, byte: u8) -> Result<(), Full> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if inner.size == N {
                return Err(Full);
            }
            inner.push(byte);
            Ok(())
        })
    }

    /// Appends every byte of `bytes` or none of them.
    ///
    /// On success, returns `true` if the buffer was empty before the call; the transmit side uses this to decide
    /// whether the transmit-ready interrupt needs to be rearmed.
    pub fn try_put_all(&self, bytes: &[u8]) -> Result<bool, Full> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if N - inner.size < bytes.len() {
                return Err(Full);
            }
            let was_empty = inner.size == 0;
            bytes.iter().for_each(|&b| inner.push(b));
            Ok(was_empty)
        })
    }

    /// Removes and returns the oldest byte.
    pub fn try_get(&self) -> Result<u8, Empty> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if inner.size == 0 {
                return Err(Empty);
            }
            let byte = inner.data[inner.tail];
            inner.tail = (inner.tail + 1) % N;
            inner.size -= 1;
            Ok(byte)
        })
    }

    /// Returns the oldest byte without removing it.
    pub fn peek(&self) -> Result<u8, Empty> {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            if inner.size == 0 {
                Err(Empty)
            } else {
                Ok(inner.data[inner.tail])
            }
        })
    }

    /// Number of bytes that can still be put.
    pub fn free_count(&self) -> usize {
        N - self.used_count()
    }

    /// Number of bytes waiting to be read.
    pub fn used_count(&self) -> usize {
        self.inner.lock(|cell| cell.borrow().size)
    }

    /// Returns `true` if there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.used_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let buffer = RingBuffer::<8>::new();
        assert!(buffer.is_empty());
        assert_eq!(8, buffer.free_count(), "Expected left but got right");
        assert_eq!(Err(Empty), buffer.try_get(), "Expected left but got right");
        assert_eq!(Err(Empty), buffer.peek(), "Expected left but got right");
    }

    #[test]
    fn fifo_order() {
        let buffer = RingBuffer::<8>::new();
        for b in [1, 2, 3] {
            buffer.try_put(b).unwrap();
        }
        assert_eq!(Ok(1), buffer.peek(), "Peek should not consume");
        assert_eq!(Ok(1), buffer.try_get());
        assert_eq!(Ok(2), buffer.try_get());
        assert_eq!(Ok(3), buffer.try_get());
        assert_eq!(Err(Empty), buffer.try_get());
    }

    #[test]
    fn put_rejected_when_full() {
        let buffer = RingBuffer::<4>::new();
        for b in 0..4 {
            assert_eq!(Ok(()), buffer.try_put(b));
        }
        assert_eq!(Err(Full), buffer.try_put(4), "Expected full buffer to reject");
        assert_eq!(Ok(0), buffer.try_get(), "Rejected put must not overwrite");
    }

    #[test]
    fn counts_always_sum_to_capacity() {
        let buffer = RingBuffer::<4>::new();
        // a mix of puts and gets which wraps the indices around several times
        let script = [true, true, false, true, true, true, true, false, false, true, false, false, false, false];
        let mut next = 0_u8;
        let mut expected = 0_u8;
        for put in script {
            if put {
                if buffer.try_put(next).is_ok() {
                    next += 1;
                }
            } else if let Ok(b) = buffer.try_get() {
                assert_eq!(expected, b, "Bytes should come out in the order they went in");
                expected += 1;
            }
            assert_eq!(4, buffer.used_count() + buffer.free_count());
        }
    }

    #[test]
    fn put_all_is_all_or_nothing() {
        let buffer = RingBuffer::<4>::new();
        buffer.try_put(9).unwrap();
        assert_eq!(Err(Full), buffer.try_put_all(&[1, 2, 3, 4]));
        assert_eq!(1, buffer.used_count(), "A rejected run must not be partially enqueued");

        assert_eq!(Ok(false), buffer.try_put_all(&[1, 2, 3]), "Buffer was not empty before the put");
        assert_eq!(0, buffer.free_count());
    }

    #[test]
    fn put_all_reports_empty_buffer() {
        let buffer = RingBuffer::<4>::new();
        assert_eq!(Ok(true), buffer.try_put_all(&[1, 2]));
        assert_eq!(Ok(false), buffer.try_put_all(&[3]));
    }
}
