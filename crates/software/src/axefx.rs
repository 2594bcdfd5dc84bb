//! The System Exclusive dialect of the Fractal Audio Axe-FX.
//!
//! Every message is framed as `F0 00 00 7D <variant> <cmd> <payload...> F7`. The adapter asks the unit for its firmware
//! version, the on/off state of its effect blocks and the name of the current patch; the unit answers each request and
//! also volunteers tuner and tempo reports.

mod block;
pub use block::*;

mod parser;
pub use parser::*;

/// Manufacturer and model bytes following the SysEx start byte.
pub const SIGNATURE: [u8; 4] = [0xF0, 0x00, 0x00, 0x7D];

/// End of Exclusive.
pub const EOX: u8 = 0xF7;

/// Command bytes of the reports the unit sends.
pub mod report {
    /// Firmware version; payload starts with `<major> <minor>`.
    pub const VERSION: u8 = 0x08;
    /// Tuner readout; payload is `<note> <string> <needle>`.
    pub const TUNER: u8 = 0x0D;
    /// Block states; payload is a run of five byte records.
    pub const BLOCKS: u8 = 0x0E;
    /// Patch name as ASCII.
    pub const PATCH_NAME: u8 = 0x0F;
    /// Sent on every beat of the tempo.
    pub const TEMPO: u8 = 0x10;
}

/// A query the adapter sends to the unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Ask for the firmware version.
    Version,
    /// Ask for the state of every block in the current patch.
    Blocks,
    /// Ask for the name of the current patch.
    PatchName,
}

impl Request {
    /// The complete SysEx frame, start and end bytes included.
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Self::Version => &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x08, 0x00, 0x00, 0xF7],
            Self::Blocks => &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0E, 0xF7],
            Self::PatchName => &[0xF0, 0x00, 0x00, 0x7D, 0x00, 0x0F, 0xF7],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_framed() {
        for request in [Request::Version, Request::Blocks, Request::PatchName] {
            let bytes = request.bytes();
            assert_eq!(&SIGNATURE, &bytes[..4], "Expected left but got right");
            assert_eq!(Some(&EOX), bytes.last(), "Expected left but got right");
        }
    }

    #[test]
    fn request_commands() {
        assert_eq!(report::VERSION, Request::Version.bytes()[5]);
        assert_eq!(report::BLOCKS, Request::Blocks.bytes()[5]);
        assert_eq!(report::PATCH_NAME, Request::PatchName.bytes()[5]);
    }
}
