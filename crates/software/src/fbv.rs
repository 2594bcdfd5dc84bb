//! The serial protocol spoken by the Line 6 FBV floor controller.
//!
//! Every frame looks like `F0 <size> <cmd> <payload...>`, where `size` counts the command byte plus the payload. The
//! controller reports button and pedal activity; the adapter answers with LED, display and tuner frames.

mod command;
pub use command::*;

mod decoder;
pub use decoder::*;

/// Identifiers the floor controller uses for its buttons and LEDs.
///
/// A button and the LED sitting on it share an identifier. The two expression pedals report positions under
/// [`WAH_VALUE`] and [`VOLUME_VALUE`] and have a button each ([`WAH_BUTTON`], [`VOLUME_BUTTON`]) which lives under a
/// different LED.
#[allow(missing_docs)]
pub mod id {
    pub const TAP: u8 = 0x61;
    pub const DELAY: u8 = 0x51;
    pub const MODULATION: u8 = 0x41;
    pub const PITCH: u8 = 0x31;
    pub const REVERB: u8 = 0x21;
    pub const AMP2: u8 = 0x11;
    pub const AMP1: u8 = 0x01;
    pub const CHAN_FAV: u8 = 0x60;
    pub const CHAN_D: u8 = 0x50;
    pub const CHAN_C: u8 = 0x40;
    pub const CHAN_B: u8 = 0x30;
    pub const CHAN_A: u8 = 0x20;
    pub const BANK_UP: u8 = 0x10;
    pub const BANK_DOWN: u8 = 0x00;
    pub const STOMP3: u8 = 0x32;
    pub const STOMP2: u8 = 0x22;
    pub const STOMP1: u8 = 0x12;
    pub const FX_LOOP: u8 = 0x02;
    pub const VOLUME_LED: u8 = 0x23;
    pub const PEDAL2_LED: u8 = 0x33;
    pub const WAH_LED: u8 = 0x03;
    pub const PEDAL1_LED: u8 = 0x13;
    pub const VOLUME_BUTTON: u8 = 0x53;
    pub const WAH_BUTTON: u8 = 0x43;
    pub const VOLUME_VALUE: u8 = 0x01;
    pub const WAH_VALUE: u8 = 0x00;
}

/// Command bytes of frames sent by the floor controller.
pub mod event {
    /// The controller (re)started and wants the handshake.
    pub const INIT: u8 = 0x90;
    /// A button changed state; payload is `<id> <pressed>`.
    pub const BUTTON: u8 = 0x81;
    /// An expression pedal moved; payload is `<pedal> <position>`.
    pub const PEDAL: u8 = 0x82;
}

/// Display group letter for user presets.
pub const CHANNEL_USER: u8 = b'U';
/// Display group letter for factory presets.
pub const CHANNEL_FACTORY: u8 = b'F';
