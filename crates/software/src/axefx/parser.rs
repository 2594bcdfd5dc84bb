//! Byte-at-a-time reassembly of SysEx messages coming from the effects unit.

use super::{EOX, SIGNATURE};
use crate::configuration::MidiPort;
use tinyvec::ArrayVec;

/// Longest payload retained; further bytes are counted but dropped.
pub const MAX_SYSEX_PAYLOAD: usize = 256;

/// Which unit sent the message, as announced by the byte following the [`SIGNATURE`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// The original Axe-FX.
    #[default]
    Standard,
    /// The Axe-FX Ultra.
    Ultra,
}

impl Variant {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Standard),
            0x01 => Some(Self::Ultra),
            _ => None,
        }
    }
}

/// A complete message from the effects unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SysexCommand {
    /// Command byte.
    pub cmd: u8,
    /// Unit that sent the message.
    pub variant: Variant,
    payload: ArrayVec<[u8; MAX_SYSEX_PAYLOAD]>,
    len: usize,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SysexCommand {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "SysexCommand {{ cmd: {=u8:#x}, variant: {}, len: {} }}",
            self.cmd,
            self.variant,
            self.len
        );
    }
}

impl SysexCommand {
    /// Constructs a command as if it had been received, mostly useful for feeding the dispatch engine directly.
    pub fn new(cmd: u8, variant: Variant, payload: &[u8]) -> Self {
        let mut command = Self {
            cmd,
            variant,
            ..Default::default()
        };
        payload.iter().for_each(|&b| command.push(b));
        command
    }

    /// The payload bytes that were kept.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_slice()
    }

    /// Number of payload bytes received, including any dropped for lack of room.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the message carried no payload at all.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` if bytes were dropped because the payload outgrew [`MAX_SYSEX_PAYLOAD`].
    pub fn is_truncated(&self) -> bool {
        self.len > self.payload.len()
    }

    fn push(&mut self, byte: u8) {
        // past the bound the byte is dropped, but still counted
        let _ = self.payload.try_push(byte);
        self.len += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Matching the signature; holds the number of bytes matched so far.
    Header(usize),
    /// Signature matched, next byte is the command.
    CmdBegin,
    /// Collecting the payload until End of Exclusive.
    CmdCont,
}

impl Default for State {
    fn default() -> Self {
        Self::Header(0)
    }
}

/// SysEx state machine for the port the effects unit is attached to.
///
/// A byte which doesn't fit the expected framing silently resets the parser, which then waits for the next
/// signature; partial messages are discarded.
#[derive(Default)]
pub struct SysexParser {
    state: State,
    scratch: SysexCommand,
}

impl SysexParser {
    /// Constructs a parser waiting for a signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a byte received on `port`. Only bytes from `effects_port` are parsed; the rest is left to whatever
    /// forwards ordinary MIDI traffic.
    pub fn feed(&mut self, port: MidiPort, effects_port: MidiPort, byte: u8) -> Option<SysexCommand> {
        if port == effects_port {
            self.push(byte)
        } else {
            None
        }
    }

    /// Consumes a single byte, returning the message it completes, if any.
    pub fn push(&mut self, byte: u8) -> Option<SysexCommand> {
        match self.state {
            State::Header(count) => {
                self.match_header(count, byte);
                None
            }
            State::CmdBegin if byte < 0x80 => {
                self.scratch.cmd = byte;
                self.state = State::CmdCont;
                trace!("AxeFX command {=u8:#x}", byte);
                None
            }
            State::CmdCont if byte == EOX => {
                let command = self.scratch;
                self.reset();
                debug!("AxeFX message complete: {}", command);
                Some(command)
            }
            State::CmdCont if byte < 0x80 => {
                self.scratch.push(byte);
                None
            }
            State::CmdBegin | State::CmdCont => {
                warn!("AxeFX data broken by {=u8:#x}", byte);
                self.reset();
                // a new message may start right here
                if byte == SIGNATURE[0] {
                    self.state = State::Header(1);
                }
                None
            }
        }
    }

    fn match_header(&mut self, count: usize, byte: u8) {
        if let Some(&expected) = SIGNATURE.get(count) {
            self.state = if byte == expected {
                State::Header(count + 1)
            } else if byte == SIGNATURE[0] {
                State::Header(1)
            } else {
                State::Header(0)
            };
            return;
        }

        match Variant::from_byte(byte) {
            Some(variant) => {
                debug!("AxeFX {} header found", variant);
                self.scratch = SysexCommand {
                    variant,
                    ..Default::default()
                };
                self.state = State::CmdBegin;
            }
            None => {
                trace!("AxeFX header mismatch on variant {=u8:#x}", byte);
                self.state = if byte == SIGNATURE[0] {
                    State::Header(1)
                } else {
                    State::Header(0)
                };
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::default();
        self.scratch = SysexCommand::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut SysexParser, bytes: &[u8]) -> Option<SysexCommand> {
        let mut last = None;
        for &b in bytes {
            if let Some(command) = parser.push(b) {
                last = Some(command);
            }
        }
        last
    }

    #[test]
    fn blocks_report() {
        let mut parser = SysexParser::new();
        assert_eq!(None, feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0E, 0x01, 0x02, 0x0F]));
        let command = parser.push(0xF7).expect("Message should be complete");
        assert_eq!(0x0E, command.cmd);
        assert_eq!(&[0x01, 0x02, 0x0F], command.payload(), "Expected left but got right");
        assert_eq!(Variant::Standard, command.variant);
    }

    #[test]
    fn ultra_variant() {
        let mut parser = SysexParser::new();
        let command = feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x01, 0x0F, b'A', 0xF7]).unwrap();
        assert_eq!(Variant::Ultra, command.variant, "Expected left but got right");
    }

    #[test]
    fn empty_payload() {
        let mut parser = SysexParser::new();
        let command = feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x10, 0xF7]).unwrap();
        assert_eq!(0x10, command.cmd);
        assert!(command.is_empty());
    }

    #[test]
    fn mismatched_header_is_ignored() {
        let mut parser = SysexParser::new();
        assert_eq!(None, feed(&mut parser, &[0xF0, 0x00, 0x01, 0x7D, 0x00, 0x0E, 0x01, 0xF7]));
        assert_eq!(None, feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x05, 0x0E, 0x01, 0xF7]));
        assert!(
            feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0E, 0xF7]).is_some(),
            "Parser should resynchronize on the next signature"
        );
    }

    #[test]
    fn status_byte_mid_payload_resets() {
        let mut parser = SysexParser::new();
        assert_eq!(None, feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0E, 0x01, 0x90, 0x02, 0xF7]));
        assert_eq!(State::Header(0), parser.state, "Expected left but got right");
    }

    #[test]
    fn end_without_command_resets() {
        let mut parser = SysexParser::new();
        assert_eq!(None, feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0xF7]));
        assert_eq!(State::Header(0), parser.state, "Expected left but got right");
    }

    #[test]
    fn start_byte_mid_payload_starts_over() {
        let mut parser = SysexParser::new();
        let command = feed(
            &mut parser,
            &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0F, b'x', 0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0F, b'y', 0xF7],
        )
        .unwrap();
        assert_eq!(b"y", command.payload(), "Expected left but got right");
    }

    #[test]
    fn oversized_payload_is_counted() {
        let mut parser = SysexParser::new();
        feed(&mut parser, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0F]);
        for _ in 0..MAX_SYSEX_PAYLOAD + 10 {
            assert_eq!(None, parser.push(0x20));
        }
        let command = parser.push(0xF7).unwrap();
        assert_eq!(MAX_SYSEX_PAYLOAD, command.payload().len());
        assert_eq!(MAX_SYSEX_PAYLOAD + 10, command.len(), "Expected left but got right");
        assert!(command.is_truncated());
    }

    #[test]
    fn other_ports_bypass_parser() {
        let mut parser = SysexParser::new();
        let effects = MidiPort::Serial(1);
        for &b in &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0F, b'A', 0xF7] {
            assert_eq!(None, parser.feed(MidiPort::Usb(0), effects, b));
        }
        assert_eq!(State::Header(0), parser.state, "Foreign bytes should not advance the parser");

        let command = [0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0F, b'A', 0xF7]
            .iter()
            .find_map(|&b| parser.feed(effects, effects, b));
        assert!(command.is_some());
    }
}
