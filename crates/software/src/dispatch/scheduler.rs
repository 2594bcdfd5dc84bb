//! Periodic duties of the [`Engine`]: blinking LEDs and telling a tap from a hold.
//!
//! [`Engine::tick`] must be called every [`TICK_PERIOD`]. Every threshold below is expressed in ticks, so a different
//! period requires rescaling them.

use super::{Actions, Engine, TapStatus, tuner_channel};
use embassy_time::Duration;

/// Time between two ticks.
pub const TICK_PERIOD: Duration = Duration::from_micros(100);

/// Length of one blink cycle, in ticks.
pub const FLASH_WINDOW: u16 = 0x2000;

/// Offset within the blink cycle at which blinking LEDs go dark.
pub const FLASH_OFF_AT: u16 = 0x400;

/// Offset within the blink cycle at which the bank indicators go dark while browsing.
pub const BANK_OFF_AT: u16 = 0x1000;

/// The tap button and the tempo flash are serviced once per this many ticks.
pub const GROUP_TICKS: u16 = 16;

/// Groups of ticks the tap button must be held for to engage the tuner: three seconds.
pub const HOLD_THRESHOLD: u16 = 1875;

/// Groups of ticks the tap button stays lit after a tempo report.
pub const TEMPO_FLASH_GROUPS: u8 = 15;

impl Engine {
    /// Advances the scheduler by one tick.
    pub fn tick(&mut self) -> Actions {
        let mut actions = Actions::new();

        match self.flash_counter {
            0 => {
                self.flash_partial_controls(true, &mut actions);
                if self.bank.is_browsing() {
                    let active = self.bank.active_indicator();
                    for &indicator in self.bank.indicators() {
                        actions.led(indicator, indicator == active);
                    }
                }
            }
            FLASH_OFF_AT => self.flash_partial_controls(false, &mut actions),
            BANK_OFF_AT => {
                if self.bank.is_browsing() {
                    for &indicator in self.bank.indicators() {
                        actions.led(indicator, false);
                    }
                }
            }
            _ => {}
        }

        if self.flash_counter % GROUP_TICKS == 0 {
            self.count_hold(&mut actions);
            self.count_tempo_flash(&mut actions);
        }

        self.flash_counter = (self.flash_counter + 1) % FLASH_WINDOW;
        actions
    }

    /// Blinks the latching switches which have at least one of their blocks bypassed.
    fn flash_partial_controls(&self, on: bool, actions: &mut Actions) {
        self.controls
            .iter()
            .filter(|control| control.is_toggle() && control.blocks.any_off())
            .for_each(|control| actions.led(control.id, on));
    }

    fn count_hold(&mut self, actions: &mut Actions) {
        if self.tempo.status != TapStatus::Pressed {
            return;
        }
        self.tempo.hold_ticks += 1;
        if self.tempo.hold_ticks < HOLD_THRESHOLD {
            return;
        }

        if let Some(tuner_cc) = self.tempo.tuner_cc {
            info!("Tap held, engaging tuner");
            actions.control_change(self.config.midi_channel, tuner_cc, 127);
            actions.fbv(tuner_channel());
        }
        // released from here on, so the hold only triggers once
        self.tempo.status = TapStatus::Released;
        self.tempo.hold_ticks = 0;
    }

    fn count_tempo_flash(&mut self, actions: &mut Actions) {
        if self.tempo.led_flash == 0 {
            return;
        }
        self.tempo.led_flash -= 1;
        if self.tempo.led_flash == 0 {
            if let Some(tap) = self.controls.iter().find(|control| control.is_tap()) {
                actions.led(tap.id, false);
            }
        }
    }
}
