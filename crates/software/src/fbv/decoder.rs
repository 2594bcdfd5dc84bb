//! Reassembles [`FbvMessage`]s from the byte stream sent by the floor controller.

use super::event;
use crate::ring_buffer::RingBuffer;
use tinyvec::ArrayVec;

/// Start of every frame.
pub const HEADER: u8 = 0xF0;

/// Longest payload a single frame may carry.
pub const MAX_PAYLOAD: usize = 64;

/// A frame received from the floor controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FbvMessage {
    header: u8,
    size: Option<u8>,
    cmd: Option<u8>,
    data: ArrayVec<[u8; MAX_PAYLOAD]>,
}

#[cfg(feature = "defmt")]
impl defmt::Format for FbvMessage {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "FbvMessage {{ size: {}, cmd: {}, data: {=[u8]:#x} }}",
            self.size,
            self.cmd,
            self.data.as_slice()
        );
    }
}

impl FbvMessage {
    /// Declared length of command plus payload.
    pub fn size(&self) -> u8 {
        self.size.unwrap_or_default()
    }

    /// Command byte; `None` for a frame which declared a size of zero.
    pub fn cmd(&self) -> Option<u8> {
        self.cmd
    }

    /// Payload bytes received so far (all of them, once the message is complete).
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Interprets the frame.
    pub fn event(&self) -> Option<FbvEvent> {
        match (self.cmd?, self.data()) {
            (event::INIT, _) => Some(FbvEvent::Init),
            (event::BUTTON, &[id, state @ (0x00 | 0x01), ..]) => Some(FbvEvent::Button {
                id,
                pressed: state == 0x01,
            }),
            (event::PEDAL, &[pedal, position, ..]) => Some(FbvEvent::Pedal { pedal, position }),
            _ => None,
        }
    }

    fn is_complete(&self) -> bool {
        match (self.size, self.cmd) {
            (Some(size), None) => usize::from(size) == self.data.len(),
            (Some(size), Some(_)) => usize::from(size) == self.data.len() + 1,
            _ => false,
        }
    }
}

/// What a floor controller frame means to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FbvEvent {
    /// The controller powered up and expects the handshake plus a full refresh of its LEDs and display.
    Init,
    /// A button was pressed or released.
    Button {
        /// Physical identifier, see [`id`](super::id).
        id: u8,
        /// `true` on press, `false` on release.
        pressed: bool,
    },
    /// An expression pedal moved.
    Pedal {
        /// `0` for the wah pedal, `1` for the volume pedal.
        pedal: u8,
        /// Position, `0..=127`.
        position: u8,
    },
}

/// Outcome of [`FbvDecoder::receive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Received {
    /// A frame was completed by the byte just consumed.
    Message(FbvMessage),
    /// A byte was consumed but the frame isn't finished yet (or the decoder is resynchronizing).
    Incomplete,
    /// The receive buffer had nothing to offer.
    Empty,
}

/// Frame decoder for the receive direction of the floor controller link.
///
/// The decoder keeps the partial frame between calls, so a single instance must be dedicated to a single stream.
#[derive(Default)]
pub struct FbvDecoder {
    scratch: FbvMessage,
}

impl FbvDecoder {
    /// Constructs a decoder waiting for the start of a frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a single byte, returning the frame it completes, if any.
    ///
    /// Bytes are ignored until a [`HEADER`] is seen; a header in the middle of a frame discards the partial frame
    /// and starts over.
    pub fn push(&mut self, byte: u8) -> Option<FbvMessage> {
        if byte == HEADER {
            self.scratch = FbvMessage {
                header: HEADER,
                ..Default::default()
            };
            return None;
        }
        if self.scratch.header != HEADER {
            return None;
        }

        if self.scratch.size.is_none() {
            self.scratch.size = Some(byte);
        } else if self.scratch.cmd.is_none() {
            self.scratch.cmd = Some(byte);
        } else if self.scratch.data.try_push(byte).is_some() {
            warn!("FBV frame exceeds {} payload bytes, discarding", MAX_PAYLOAD);
            self.scratch = FbvMessage::default();
            return None;
        }

        if self.scratch.is_complete() {
            let message = self.scratch;
            // wait for the next header; anything before it is noise
            self.scratch = FbvMessage::default();
            trace!("FBV message complete: {}", message);
            Some(message)
        } else {
            None
        }
    }

    /// Takes one byte out of `rx` and feeds it to the decoder.
    pub fn receive<const N: usize>(&mut self, rx: &RingBuffer<N>) -> Received {
        match rx.try_get() {
            Ok(byte) => self.push(byte).map_or(Received::Incomplete, Received::Message),
            Err(_) => Received::Empty,
        }
    }

    /// Drains `rx`, returning the first complete frame. Call repeatedly to collect every queued frame; `None` means
    /// the buffer is exhausted.
    pub fn next_message<const N: usize>(&mut self, rx: &RingBuffer<N>) -> Option<FbvMessage> {
        loop {
            match self.receive(rx) {
                Received::Message(message) => return Some(message),
                Received::Incomplete => continue,
                Received::Empty => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut FbvDecoder, bytes: &[u8]) -> Option<FbvMessage> {
        let mut last = None;
        for &b in bytes {
            if let Some(message) = decoder.push(b) {
                last = Some(message);
            }
        }
        last
    }

    #[test]
    fn button_frame() {
        let mut decoder = FbvDecoder::new();
        let message = feed(&mut decoder, &[0xF0, 0x03, 0x81, 0x10, 0x01]).expect("Frame should be complete");
        assert_eq!(Some(0x81), message.cmd());
        assert_eq!(&[0x10, 0x01], message.data(), "Expected left but got right");
        assert_eq!(
            Some(FbvEvent::Button { id: 0x10, pressed: true }),
            message.event(),
            "Expected left but got right"
        );
    }

    #[test]
    fn unknown_button_state() {
        let mut decoder = FbvDecoder::new();
        let message = feed(&mut decoder, &[0xF0, 0x03, 0x81, 0x61, 0x02]).expect("Frame should be complete");
        assert_eq!(None, message.event(), "Only 0x00 and 0x01 are button states");

        let message = feed(&mut decoder, &[0xF0, 0x03, 0x81, 0x61, 0x00]).unwrap();
        assert_eq!(
            Some(FbvEvent::Button { id: 0x61, pressed: false }),
            message.event(),
            "Expected left but got right"
        );
    }

    #[test]
    fn completes_only_on_last_byte() {
        let mut decoder = FbvDecoder::new();
        for b in [0xF0, 0x03, 0x82, 0x00] {
            assert_eq!(None, decoder.push(b), "Frame should not be complete yet");
        }
        let message = decoder.push(0x40).expect("Frame should be complete");
        assert_eq!(Some(FbvEvent::Pedal { pedal: 0, position: 0x40 }), message.event());
    }

    #[test]
    fn command_only_frame() {
        let mut decoder = FbvDecoder::new();
        let message = feed(&mut decoder, &[0xF0, 0x01, 0x90]).expect("Frame should be complete");
        assert!(message.data().is_empty());
        assert_eq!(Some(FbvEvent::Init), message.event());
    }

    #[test]
    fn zero_size_frame() {
        let mut decoder = FbvDecoder::new();
        let message = feed(&mut decoder, &[0xF0, 0x00]).expect("Frame should be complete");
        assert_eq!(0, message.size());
        assert_eq!(None, message.cmd());
        assert_eq!(None, message.event());
    }

    #[test]
    fn ignores_noise_before_header() {
        let mut decoder = FbvDecoder::new();
        assert_eq!(None, feed(&mut decoder, &[0x03, 0x81, 0x10, 0x01]), "No header, no frame");
        assert!(feed(&mut decoder, &[0xF0, 0x03, 0x81, 0x10, 0x00]).is_some());
    }

    #[test]
    fn header_restarts_partial_frame() {
        let mut decoder = FbvDecoder::new();
        let message = feed(&mut decoder, &[0xF0, 0x03, 0x81, 0xF0, 0x03, 0x81, 0x20, 0x00]).unwrap();
        assert_eq!(
            Some(FbvEvent::Button { id: 0x20, pressed: false }),
            message.event(),
            "Expected left but got right"
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut decoder = FbvDecoder::new();
        assert!(feed(&mut decoder, &[0xF0, 0x03, 0x81, 0x10, 0x01]).is_some());
        assert_eq!(None, feed(&mut decoder, &[0x03, 0x81, 0x10, 0x01]));
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut decoder = FbvDecoder::new();
        assert_eq!(None, decoder.push(0xF0));
        assert_eq!(None, decoder.push(0x7F));
        assert_eq!(None, decoder.push(0x11));
        for _ in 0..MAX_PAYLOAD + 1 {
            assert_eq!(None, decoder.push(0x00));
        }
        assert!(feed(&mut decoder, &[0xF0, 0x01, 0x90]).is_some(), "Decoder should recover");
    }

    #[test]
    fn drains_ring_buffer() {
        let rx = RingBuffer::<32>::new();
        rx.try_put_all(&[0xF0, 0x03, 0x81, 0x61, 0x01, 0xF0, 0x03, 0x81, 0x61, 0x00, 0xF0, 0x03])
            .unwrap();
        let mut decoder = FbvDecoder::new();

        let first = decoder.next_message(&rx).unwrap();
        assert_eq!(Some(FbvEvent::Button { id: 0x61, pressed: true }), first.event());
        let second = decoder.next_message(&rx).unwrap();
        assert_eq!(Some(FbvEvent::Button { id: 0x61, pressed: false }), second.event());
        assert_eq!(None, decoder.next_message(&rx), "Partial frame should stay pending");
        assert_eq!(Received::Empty, decoder.receive(&rx));

        rx.try_put_all(&[0x81, 0x61, 0x01]).unwrap();
        assert!(decoder.next_message(&rx).is_some(), "Partial frame should survive between calls");
    }
}
