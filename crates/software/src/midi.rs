//! Outgoing MIDI: where messages go and how they are put on the wire.

use wmidi::{Channel, ControlFunction, MidiMessage, U7};

/// The two places Control and Program Changes are sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Destination {
    /// The USB-MIDI interface.
    Primary,
    /// The serial MIDI port the effects unit is attached to.
    Secondary,
}

impl Destination {
    /// Every destination, in the order messages are sent.
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];
}

/// Builds a Control Change; out of range numbers and values are clamped to seven bits.
pub fn control_change(channel: Channel, cc: u8, value: u8) -> MidiMessage<'static> {
    MidiMessage::ControlChange(
        channel,
        ControlFunction(seven_bit(cc)),
        seven_bit(value),
    )
}

/// Builds a Program Change; out of range programs are clamped to seven bits.
pub fn program_change(channel: Channel, program: u8) -> MidiMessage<'static> {
    MidiMessage::ProgramChange(channel, seven_bit(program))
}

fn seven_bit(value: u8) -> U7 {
    U7::from_u8_lossy(value.min(0x7F))
}

/// Serializes a short message into raw MIDI bytes, returning how many bytes of `buf` were written.
///
/// Returns `None` if the message doesn't fit `buf`.
pub fn serial_bytes(message: &MidiMessage, buf: &mut [u8]) -> Option<usize> {
    message.copy_to_slice(buf).ok()
}

/// Wraps a channel message into a USB-MIDI event packet on `cable`.
///
/// Returns `None` for anything but channel messages (i.e., System Exclusive and other system messages).
pub fn usb_packet(cable: u8, message: &MidiMessage) -> Option<[u8; 4]> {
    let mut bytes = [0_u8; 3];
    message.copy_to_slice(&mut bytes).ok()?;
    let status = bytes[0];
    if !(0x80..0xF0).contains(&status) {
        return None;
    }
    // code index number equals the status nibble for channel messages
    Some([((cable & 0x0F) << 4) | (status >> 4), bytes[0], bytes[1], bytes[2]])
}

/// Chops a System Exclusive message into USB-MIDI event packets on `cable`.
///
/// `sysex` must span the whole message, from the start byte through End of Exclusive.
pub fn usb_sysex_packets(cable: u8, sysex: &[u8]) -> impl Iterator<Item = [u8; 4]> + '_ {
    let cable = (cable & 0x0F) << 4;
    let last = sysex.len().saturating_sub(1) / 3;
    sysex.chunks(3).enumerate().map(move |(i, chunk)| {
        // start/continue, or the end with one, two or three bytes
        let code = match (i == last, chunk.len()) {
            (false, _) => 0x4,
            (true, 1) => 0x5,
            (true, 2) => 0x6,
            (true, _) => 0x7,
        };
        let mut packet = [cable | code, 0, 0, 0];
        packet[1..=chunk.len()].copy_from_slice(chunk);
        packet
    })
}

/// Splits a USB-MIDI event packet into its cable number and the MIDI bytes it carries.
///
/// The length is taken from the code index number, so System Exclusive fragments come out with exactly the bytes that
/// belong to the stream. Reserved and cable events carry nothing.
pub fn usb_payload(packet: &[u8; 4]) -> (u8, &[u8]) {
    let cable = packet[0] >> 4;
    let len = match packet[0] & 0x0F {
        0x5 | 0xF => 1,
        0x2 | 0x6 | 0xC | 0xD => 2,
        0x3 | 0x4 | 0x7 | 0x8 | 0x9 | 0xA | 0xB | 0xE => 3,
        _ => 0,
    };
    (cable, &packet[1..1 + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_change_on_the_wire() {
        let message = control_change(Channel::Ch1, 28, 127);
        let mut buf = [0; 3];
        assert_eq!(Some(3), serial_bytes(&message, &mut buf));
        assert_eq!([0xB0, 28, 127], buf, "Expected left but got right");
    }

    #[test]
    fn program_change_on_the_wire() {
        let message = program_change(Channel::Ch2, 5);
        let mut buf = [0; 3];
        assert_eq!(Some(2), serial_bytes(&message, &mut buf));
        assert_eq!([0xC1, 5], buf[..2], "Expected left but got right");
    }

    #[test]
    fn usb_packets() {
        assert_eq!(
            Some([0x0B, 0xB0, 14, 127]),
            usb_packet(0, &control_change(Channel::Ch1, 14, 127)),
            "Expected left but got right"
        );
        assert_eq!(
            Some([0x1C, 0xC0, 1, 0]),
            usb_packet(1, &program_change(Channel::Ch1, 1)),
            "Expected left but got right"
        );
    }

    #[test]
    fn system_messages_have_no_packet() {
        assert_eq!(None, usb_packet(0, &MidiMessage::TimingClock));
    }

    #[test]
    fn sysex_fragments() {
        assert_eq!((1, &[0xF0, 0x00, 0x00][..]), usb_payload(&[0x14, 0xF0, 0x00, 0x00]));
        assert_eq!((1, &[0x0F, 0xF7][..]), usb_payload(&[0x16, 0x0F, 0xF7, 0x00]));
        assert_eq!((0, &[0xF7][..]), usb_payload(&[0x05, 0xF7, 0x00, 0x00]));
        assert_eq!((0, &[][..]), usb_payload(&[0x00, 0x12, 0x34, 0x56]), "Reserved events carry nothing");
    }

    #[test]
    fn sysex_into_packets() {
        let mut packets = usb_sysex_packets(0, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0E, 0xF7]);
        assert_eq!(Some([0x04, 0xF0, 0x00, 0x00]), packets.next());
        assert_eq!(Some([0x04, 0x7D, 0x00, 0x0E]), packets.next());
        assert_eq!(Some([0x05, 0xF7, 0x00, 0x00]), packets.next(), "Expected left but got right");
        assert_eq!(None, packets.next());

        let mut packets = usb_sysex_packets(1, &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x08, 0x00, 0x00, 0xF7]);
        assert_eq!(Some([0x14, 0xF0, 0x00, 0x00]), packets.next());
        assert_eq!(Some([0x14, 0x7D, 0x00, 0x08]), packets.next());
        assert_eq!(Some([0x17, 0x00, 0x00, 0xF7]), packets.next(), "Expected left but got right");
        assert_eq!(None, packets.next());
    }

    #[test]
    fn packets_unwrap_into_channel_messages() {
        let packet = usb_packet(0, &control_change(Channel::Ch1, 14, 127)).unwrap();
        assert_eq!((0, &[0xB0, 14, 127][..]), usb_payload(&packet), "Expected left but got right");
    }

    #[test]
    fn values_are_clamped() {
        let message = control_change(Channel::Ch1, 200, 255);
        let mut buf = [0; 3];
        serial_bytes(&message, &mut buf).unwrap();
        assert_eq!([0xB0, 0x7F, 0x7F], buf);
    }
}
