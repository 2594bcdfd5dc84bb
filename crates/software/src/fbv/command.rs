//! Frames the adapter sends to the floor controller.

use super::{HEADER, id};
use tinyvec::ArrayVec;

/// Width of the text display, in characters.
pub const DISPLAY_WIDTH: usize = 16;

/// Encoded bytes of a single [`FbvCommand`], possibly spanning several frames.
pub type Frame = ArrayVec<[u8; 32]>;

/// Sixteen characters of display text.
pub type DisplayText = [u8; DISPLAY_WIDTH];

/// Pads (with spaces) or truncates `text` to exactly [`DISPLAY_WIDTH`] characters.
pub fn display_text(text: &[u8]) -> DisplayText {
    let mut out = [b' '; DISPLAY_WIDTH];
    out.iter_mut().zip(text).for_each(|(o, &t)| *o = t);
    out
}

/// Something the floor controller should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FbvCommand {
    /// Handshake answering the controller's init frame.
    Init,
    /// Switch a single LED.
    Led {
        /// Physical identifier of the LED, or of the pedal button the LED belongs to.
        id: u8,
        /// `true` to light the LED.
        on: bool,
    },
    /// The channel readout: a group letter followed by two characters (the bank number, normally).
    Channel {
        /// Group letter, e.g. [`CHANNEL_USER`](super::CHANNEL_USER).
        group: u8,
        /// The two characters of the readout.
        digits: [u8; 2],
    },
    /// The sixteen character text display.
    Display(DisplayText),
    /// Tuner mode: blanks the channel readout, shows the note letter and switches the flat sign.
    Tuner {
        /// ASCII note letter, or a space to show nothing.
        note: u8,
        /// `true` to show the flat sign.
        flat: bool,
    },
}

impl FbvCommand {
    /// Shows the bank number as two ASCII digits in the user group.
    pub fn bank(bank: u8) -> Self {
        Self::Channel {
            group: super::CHANNEL_USER,
            digits: [b'0' + (bank / 10) % 10, b'0' + bank % 10],
        }
    }

    /// Shows `text`, padded or truncated to the width of the display.
    pub fn display(text: &[u8]) -> Self {
        Self::Display(display_text(text))
    }

    /// Encodes the command into its wire format.
    pub fn encode(&self) -> Frame {
        let mut frame = Frame::new();
        match *self {
            Self::Init => frame.extend_from_slice(&[HEADER, 0x02, 0x01, 0x00]),
            Self::Led { id, on } => {
                frame.extend_from_slice(&[HEADER, 0x03, 0x04, led_for(id), u8::from(on)])
            }
            Self::Channel { group, digits } => {
                frame.extend_from_slice(&[HEADER, 0x05, 0x08, group, b' ', digits[0], digits[1]]);
                frame.extend_from_slice(&[HEADER, 0x02, 0x20, 0x00]);
            }
            Self::Display(text) => {
                frame.extend_from_slice(&[HEADER, 0x13, 0x10, 0x00, 0x10]);
                frame.extend_from_slice(&text);
            }
            Self::Tuner { note, flat } => {
                frame.extend_from_slice(&[HEADER, 0x05, 0x08, b' ', b' ', b' ', b' ']);
                frame.extend_from_slice(&[HEADER, 0x02, 0x0C, note]);
                frame.extend_from_slice(&[HEADER, 0x02, 0x20, u8::from(flat)]);
            }
        }
        frame
    }
}

/// The pedal buttons have no LED of their own; their state is shown on the LED next to the pedal.
fn led_for(button: u8) -> u8 {
    match button {
        id::WAH_BUTTON => id::PEDAL1_LED,
        id::VOLUME_BUTTON => id::VOLUME_LED,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init() {
        assert_eq!(&[0xF0, 0x02, 0x01, 0x00], FbvCommand::Init.encode().as_slice());
    }

    #[test]
    fn led() {
        let frame = FbvCommand::Led { id: 0x10, on: true }.encode();
        assert_eq!(&[0xF0, 0x03, 0x04, 0x10, 0x01], frame.as_slice(), "Expected left but got right");
    }

    #[test]
    fn led_for_pedal_buttons() {
        let wah = FbvCommand::Led { id: id::WAH_BUTTON, on: false }.encode();
        assert_eq!(&[0xF0, 0x03, 0x04, id::PEDAL1_LED, 0x00], wah.as_slice());
        let volume = FbvCommand::Led { id: id::VOLUME_BUTTON, on: true }.encode();
        assert_eq!(&[0xF0, 0x03, 0x04, id::VOLUME_LED, 0x01], volume.as_slice());
    }

    #[test]
    fn bank_display() {
        let frame = FbvCommand::bank(7).encode();
        assert_eq!(
            &[0xF0, 0x05, 0x08, b'U', 0x20, b'0', b'7', 0xF0, 0x02, 0x20, 0x00],
            frame.as_slice(),
            "Expected left but got right"
        );
        let frame = FbvCommand::bank(20).encode();
        assert_eq!(&[b'2', b'0'], &frame[5..7], "Expected left but got right");
    }

    #[test]
    fn display_pads_short_text() {
        let frame = FbvCommand::display(b"Clean").encode();
        assert_eq!(21, frame.len());
        assert_eq!(&[0xF0, 0x13, 0x10, 0x00, 0x10], &frame[..5]);
        assert_eq!(b"Clean           ", &frame[5..]);
    }

    #[test]
    fn display_truncates_long_text() {
        let frame = FbvCommand::display(b"A very long patch name").encode();
        assert_eq!(b"A very long patc", &frame[5..], "Expected left but got right");
    }

    #[test]
    fn tuner() {
        let frame = FbvCommand::Tuner { note: b'B', flat: true }.encode();
        assert_eq!(
            &[
                0xF0, 0x05, 0x08, 0x20, 0x20, 0x20, 0x20, //
                0xF0, 0x02, 0x0C, b'B', //
                0xF0, 0x02, 0x20, 0x01,
            ],
            frame.as_slice(),
            "Expected left but got right"
        );
    }
}
