//! The serial link to the floor controller: a receive and a transmit [`RingBuffer`] plus the hooks the hardware
//! driver needs to service them.
//!
//! The driver calls [`SerialTransport::rx_byte_available`] for each received byte and answers every transmit-ready
//! event with [`SerialTransport::tx_next_byte`]. Application code enqueues whole frames with
//! [`SerialTransport::send`], which never interleaves the bytes of two frames.

use crate::ring_buffer::{DEFAULT_CAPACITY, Empty, RingBuffer};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

/// The transmit-ready interrupt of the underlying UART (or whatever stands in for it).
pub trait TxInterrupt {
    /// Arms the interrupt; called when the first byte lands in an empty transmit buffer.
    fn enable(&self);
    /// Disarms the interrupt; called when a transmit-ready event finds nothing left to send.
    fn disable(&self);
}

/// The transmit buffer lacks room for the entire frame right now; try again once the link has drained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Retry;

/// The frame is longer than the transmit buffer could ever hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Oversized;

/// A full-duplex buffered serial link.
pub struct SerialTransport<I, const N: usize = DEFAULT_CAPACITY> {
    rx: RingBuffer<N>,
    tx: RingBuffer<N>,
    tx_interrupt: I,
    /// Raised whenever the transmit side frees space, waking senders parked in [`SerialTransport::send`].
    tx_drained: Signal<CriticalSectionRawMutex, ()>,
}

impl<I: TxInterrupt, const N: usize> SerialTransport<I, N> {
    /// Constructs a transport with empty buffers.
    pub const fn new(tx_interrupt: I) -> Self {
        Self {
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
            tx_interrupt,
            tx_drained: Signal::new(),
        }
    }

    /// Receive-side entry point for the driver. A byte arriving while the receive buffer is full is dropped.
    pub fn rx_byte_available(&self, byte: u8) {
        if self.rx.try_put(byte).is_err() {
            warn!("FBV receive buffer full, dropping {=u8:#x}", byte);
        }
    }

    /// Transmit-side entry point for the driver: returns the next byte to put on the wire, disarming the transmit
    /// interrupt once the buffer has run dry.
    pub fn tx_next_byte(&self) -> Option<u8> {
        match self.tx.try_get() {
            Ok(byte) => {
                self.tx_drained.signal(());
                Some(byte)
            }
            Err(Empty) => {
                self.tx_interrupt.disable();
                None
            }
        }
    }

    /// The receive buffer, drained by the frame decoder.
    pub fn rx(&self) -> &RingBuffer<N> {
        &self.rx
    }

    /// The transmit buffer.
    pub fn tx(&self) -> &RingBuffer<N> {
        &self.tx
    }

    /// The hook armed by [`send_non_blocking`](Self::send_non_blocking).
    pub fn tx_interrupt(&self) -> &I {
        &self.tx_interrupt
    }

    /// Enqueues all of `bytes` or, if there isn't room for every one of them, none.
    pub fn send_non_blocking(&self, bytes: &[u8]) -> Result<(), Retry> {
        match self.tx.try_put_all(bytes) {
            Ok(was_empty) => {
                if was_empty && !bytes.is_empty() {
                    self.tx_interrupt.enable();
                }
                Ok(())
            }
            Err(_) => Err(Retry),
        }
    }

    /// Enqueues all of `bytes`, waiting for the link to drain as often as needed.
    ///
    /// Must not be awaited from the context that services [`tx_next_byte`](Self::tx_next_byte), since that's what
    /// makes room.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), Oversized> {
        if bytes.len() > N {
            error!("{} byte frame can never fit a {} byte transmit buffer", bytes.len(), N);
            return Err(Oversized);
        }
        loop {
            // clear any stale wake-up first so the wait below only returns for drains which happen after this attempt
            self.tx_drained.reset();
            match self.send_non_blocking(bytes) {
                Ok(()) => return Ok(()),
                Err(Retry) => self.tx_drained.wait().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use embassy_futures::{block_on, join::join, yield_now};

    #[derive(Default)]
    struct FakeInterrupt {
        armed: Cell<bool>,
        arm_count: Cell<u8>,
    }

    impl TxInterrupt for FakeInterrupt {
        fn enable(&self) {
            self.armed.set(true);
            self.arm_count.set(self.arm_count.get() + 1);
        }

        fn disable(&self) {
            self.armed.set(false);
        }
    }

    fn transport() -> SerialTransport<FakeInterrupt, 8> {
        SerialTransport::new(FakeInterrupt::default())
    }

    #[test]
    fn first_byte_arms_interrupt() {
        let link = transport();
        link.send_non_blocking(&[0xF0, 0x02]).unwrap();
        assert!(link.tx_interrupt.armed.get(), "Interrupt should be armed");

        link.send_non_blocking(&[0x01, 0x00]).unwrap();
        assert_eq!(1, link.tx_interrupt.arm_count.get(), "Should only arm on an empty buffer");
    }

    #[test]
    fn drain_disarms_interrupt() {
        let link = transport();
        link.send_non_blocking(&[1, 2]).unwrap();
        assert_eq!(Some(1), link.tx_next_byte());
        assert_eq!(Some(2), link.tx_next_byte());
        assert!(link.tx_interrupt.armed.get(), "Still armed until a ready event finds nothing");
        assert_eq!(None, link.tx_next_byte());
        assert!(!link.tx_interrupt.armed.get(), "Interrupt should be disarmed");
    }

    #[test]
    fn non_blocking_send_is_atomic() {
        let link = transport();
        link.send_non_blocking(&[0; 6]).unwrap();
        assert_eq!(Err(Retry), link.send_non_blocking(&[1, 2, 3]));
        assert_eq!(6, link.tx().used_count(), "Nothing of the rejected frame should be enqueued");
    }

    #[test]
    fn send_fits_exactly() {
        let link = transport();
        assert_eq!(Ok(()), block_on(link.send(&[7; 8])));
        assert_eq!(0, link.tx().free_count());
    }

    #[test]
    fn send_waits_for_room() {
        let link: SerialTransport<FakeInterrupt, 4> = SerialTransport::new(FakeInterrupt::default());
        link.send_non_blocking(&[1, 2, 3]).unwrap();

        let drain = async {
            let mut drained = [0; 5];
            let mut n = 0;
            while n < drained.len() {
                if let Some(b) = link.tx_next_byte() {
                    drained[n] = b;
                    n += 1;
                }
                yield_now().await;
            }
            drained
        };
        let (sent, drained) = block_on(join(link.send(&[9, 9]), drain));

        assert_eq!(Ok(()), sent, "Frame should be enqueued once room frees up");
        assert_eq!([1, 2, 3, 9, 9], drained, "Expected left but got right");
        assert_eq!(0, link.tx().used_count());
    }

    #[test]
    fn send_rejects_oversized_frame() {
        let link = transport();
        assert_eq!(Err(Oversized), block_on(link.send(&[0; 9])));
        assert!(link.tx().is_empty());
    }

    #[test]
    fn received_bytes_are_queued() {
        let link = transport();
        link.rx_byte_available(0xF0);
        link.rx_byte_available(0x04);
        assert_eq!(Ok(0xF0), link.rx().try_get());
        assert_eq!(Ok(0x04), link.rx().try_get());
    }

    #[test]
    fn overflowing_receive_drops_newest() {
        let link = transport();
        (0..10).for_each(|b| link.rx_byte_available(b));
        assert_eq!(8, link.rx().used_count());
        assert_eq!(Ok(0), link.rx().peek(), "Oldest bytes are kept");
    }
}
