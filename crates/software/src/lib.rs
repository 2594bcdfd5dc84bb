//! This crate contains architecture-agnostic logic for the FBV bridge, a device which lets a
//! [Line 6 FBV](https://line6.com/foot-controllers/) floor controller drive a
//! [Fractal Audio Axe-FX](https://www.fractalaudio.com/) effects processor. Button presses and pedal sweeps coming from
//! the floor controller are translated into [MIDI](https://midi.org/midi-1-0) Control and Program Changes, while the
//! effects unit's System Exclusive reports (bypass states, patch names, tempo, tuner) are reflected back onto the floor
//! controller's LEDs and display.
//!
//! Nothing in here touches hardware: the firmware crate moves bytes between the peripherals and the types below.

#![deny(missing_docs)]
#![no_std]

#[macro_use]
mod fmt;

pub mod axefx;
pub mod configuration;
pub mod control;
pub mod dispatch;
pub mod fbv;
pub mod midi;
pub mod ring_buffer;
pub mod shared;
pub mod transport;
