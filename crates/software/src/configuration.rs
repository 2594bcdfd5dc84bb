//! This module contains the settings the adapter runs with, along with a trait to make enum-based state easier to work with
//! in code.

use crate::fbv::{DisplayText, display_text};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use wmidi::Channel;

/// A trait which allows infinite cycling of an enum's variants.
///
/// Useful for pushbutton user interfaces, allowing presses to advance from the current to the next variant,
/// cycling back to the beginning when all variants have been exhausted.
pub trait Cycle {
    /// Return the next variant, cycling back to the beginning as needed.
    fn cycle(self) -> Self
    where
        Self: FromPrimitive + ToPrimitive + Default + Sized,
    {
        self.to_u8()
            .and_then(|index| index.checked_add(1))
            .and_then(<Self as FromPrimitive>::from_u8)
            .or_else(|| <Self as FromPrimitive>::from_u8(0))
            .unwrap_or_default()
    }
}

/// On/off state of a switch, whether a button on the floor controller or a block inside the effects unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Toggle {
    /// Bypassed, LED dark.
    #[default]
    Off,
    /// Engaged, LED lit.
    On,
}
impl Cycle for Toggle {}

impl Toggle {
    /// Reads a status byte as reported by the effects unit: zero is off, anything else on.
    pub fn from_status(status: u8) -> Self {
        if status == 0 { Self::Off } else { Self::On }
    }

    /// `true` for [`Toggle::On`].
    pub fn is_on(self) -> bool {
        self == Self::On
    }

    /// Control Change value announcing this state.
    pub fn cc_value(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 127,
        }
    }
}

/// A MIDI port of the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiPort {
    /// A virtual cable of the USB-MIDI interface.
    Usb(u8),
    /// A serial (5-pin DIN) MIDI port.
    Serial(u8),
}

/// Settings the dispatch engine runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Channel the rack listens on for Control and Program Changes.
    pub midi_channel: Channel,
    /// Presets per bank; also the number of bank indicator LEDs in use.
    pub bank_size: u8,
    /// Highest bank reachable with the bank buttons before wrapping around to zero.
    pub last_bank: u8,
    /// Port the effects unit is attached to; only SysEx arriving here is parsed.
    pub effects_port: MidiPort,
    /// Shown on the display at startup, until the effects unit reports the patch name.
    pub greeting: DisplayText,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            midi_channel: Channel::Ch1,
            bank_size: 4,
            last_bank: 20,
            effects_port: MidiPort::Serial(1),
            greeting: display_text(b"FBV Bridge ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq)]
    enum Alpha {
        #[default]
        A,
        B,
        C,
    }
    impl Cycle for Alpha {}

    #[test]
    fn cycle() {
        let config = Alpha::A.cycle();
        assert_eq!(
            Alpha::B,
            config,
            "Should advance to next variant; expected left but got right"
        );

        let config = config.cycle();
        assert_eq!(
            Alpha::C,
            config,
            "Should advance to next variant; expected left but got right"
        );

        let config = config.cycle();
        assert_eq!(
            Alpha::A,
            config,
            "Should wrap around to first variant; expected left but got right"
        );
    }

    #[test]
    fn toggle_flips() {
        assert_eq!(Toggle::On, Toggle::Off.cycle(), "Expected left but got right");
        assert_eq!(Toggle::Off, Toggle::On.cycle(), "Expected left but got right");
    }

    #[test]
    fn toggle_from_status() {
        assert_eq!(Toggle::Off, Toggle::from_status(0));
        assert_eq!(Toggle::On, Toggle::from_status(1));
        assert_eq!(Toggle::On, Toggle::from_status(0x7F));
    }

    #[test]
    fn cc_values() {
        assert_eq!(0, Toggle::Off.cc_value());
        assert_eq!(127, Toggle::On.cc_value());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(Channel::Ch1, config.midi_channel);
        assert_eq!(4, config.bank_size);
        assert_eq!(20, config.last_bank);
        assert_eq!(MidiPort::Serial(1), config.effects_port);
        assert_eq!(b"FBV Bridge ready", &config.greeting);
    }
}
