//! The registry of physical controls on the floor controller and what each of them does.
//!
//! Controls are looked up by the identifier the floor controller reports for them. The effect blocks a control stands
//! for are learned at runtime from the effects unit (see [`Control::blocks`]); everything else is fixed at startup.

use crate::{configuration::Toggle, fbv::id};
use tinyvec::ArrayVec;

/// Most effect blocks a single control can be bound to.
pub const MAX_BLOCKS: usize = 8;

/// Returned by [`BlockBindings::try_push`] when a control already has [`MAX_BLOCKS`] bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError;

/// Block Control Change numbers at or above this value mean the block cannot be switched by a Control Change of its own.
pub const NO_DIRECT_CC: u16 = 128;

/// One effect block of the current patch, as reported by the effects unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockBinding {
    /// Block identifier, see [`block_id`](crate::axefx::block_id).
    pub block: u16,
    /// Control Change number switching the block.
    pub cc: u16,
    /// Whether the block is engaged.
    pub state: Toggle,
}

impl BlockBinding {
    /// The Control Change number to switch this block with, unless it has none.
    pub fn direct_cc(&self) -> Option<u8> {
        if self.cc < NO_DIRECT_CC {
            u8::try_from(self.cc).ok()
        } else {
            None
        }
    }
}

/// The effect blocks bound to a control, in report order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockBindings(ArrayVec<[BlockBinding; MAX_BLOCKS]>);

#[cfg(feature = "defmt")]
impl defmt::Format for BlockBindings {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.0.as_slice());
    }
}

impl BlockBindings {
    /// Appends a binding unless the list is full.
    pub fn try_push(&mut self, binding: BlockBinding) -> Result<(), CapacityError> {
        match self.0.try_push(binding) {
            None => Ok(()),
            Some(_) => Err(CapacityError),
        }
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the bindings.
    pub fn iter(&self) -> impl Iterator<Item = &BlockBinding> {
        self.0.iter()
    }

    /// Iterates mutably over the bindings.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BlockBinding> {
        self.0.iter_mut()
    }

    /// `true` if at least one bound block is bypassed.
    pub fn any_off(&self) -> bool {
        self.iter().any(|binding| binding.state == Toggle::Off)
    }
}

/// Which way a bank button moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Towards bank zero.
    Down,
    /// Towards the last bank.
    Up,
}

/// The two expression pedals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pedal {
    /// Left pedal, reported as pedal `0`.
    Wah,
    /// Right pedal, reported as pedal `1`.
    Volume,
}

impl Pedal {
    /// Maps the pedal index of a pedal event.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Wah),
            1 => Some(Self::Volume),
            _ => None,
        }
    }

    /// Position of the pedal in [`Engine`](crate::dispatch::Engine)'s pedal table.
    pub fn index(self) -> usize {
        match self {
            Self::Wah => 0,
            Self::Volume => 1,
        }
    }
}

/// What pressing a control does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Behavior {
    /// Latching switch: flips its own state and those of the blocks bound to it, mirrored on its LED.
    ToggleButtonLed {
        /// Control Change number announcing the switch's state.
        cc: u8,
    },
    /// Moves the displayed bank without changing the preset.
    BankSwitch(Direction),
    /// Recalls preset `bank * bank_size + offset`.
    PresetSelect {
        /// Position of the preset within the bank.
        offset: u8,
    },
    /// Tap tempo.
    TapTempo {
        /// Control Change number sent on every tap.
        cc: u8,
    },
    /// Tap tempo, entering the tuner when held.
    TapTempoTuner {
        /// Control Change number sent on every tap.
        cc: u8,
        /// Control Change number engaging the tuner.
        tuner_cc: u8,
    },
    /// The button of an expression pedal, switching which Control Change the pedal sends.
    ContinuousPedal(Pedal),
}

/// A button on the floor controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Control {
    /// Identifier of the button and of the LED on it.
    pub id: u8,
    /// What pressing it does.
    pub behavior: Behavior,
    /// State of a [`Behavior::ToggleButtonLed`] control.
    pub toggle: Toggle,
    /// Blocks of the current patch this control switches.
    pub blocks: BlockBindings,
}

impl Control {
    /// Constructs a control without block bindings, switched off.
    pub fn new(id: u8, behavior: Behavior) -> Self {
        Self {
            id,
            behavior,
            toggle: Toggle::Off,
            blocks: BlockBindings::default(),
        }
    }

    /// `true` for latching switches.
    pub fn is_toggle(&self) -> bool {
        matches!(self.behavior, Behavior::ToggleButtonLed { .. })
    }

    /// `true` for tap tempo controls, with or without tuner.
    pub fn is_tap(&self) -> bool {
        matches!(self.behavior, Behavior::TapTempo { .. } | Behavior::TapTempoTuner { .. })
    }
}

/// An expression pedal along with its button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContinuousControl {
    /// Pedal index the floor controller reports positions under.
    pub foot_id: u8,
    /// Identifier of the button switching the pedal's mode.
    pub button_id: u8,
    /// LED lit while the pedal is off.
    pub led_a: u8,
    /// LED lit while the pedal is on.
    pub led_b: u8,
    /// Control Change number announcing the mode.
    pub cc: u8,
    /// Control Change number carrying the position while off.
    pub cc_low: u8,
    /// Control Change number carrying the position while on.
    pub cc_high: u8,
    /// Current mode.
    pub toggle: Toggle,
    /// Blocks of the current patch this pedal switches.
    pub blocks: BlockBindings,
}

impl ContinuousControl {
    /// Control Change number the current position goes out on.
    pub fn position_cc(&self) -> u8 {
        match self.toggle {
            Toggle::Off => self.cc_low,
            Toggle::On => self.cc_high,
        }
    }
}

/// Number of buttons in the registry.
pub const CONTROL_COUNT: usize = 20;

/// Buttons which may serve as bank indicators, in preset order; the first `bank_size` are used.
pub const BANK_IDS: [u8; 10] = [
    id::CHAN_A,
    id::CHAN_B,
    id::CHAN_C,
    id::CHAN_D,
    id::CHAN_FAV,
    id::REVERB,
    id::PITCH,
    id::MODULATION,
    id::DELAY,
    id::TAP,
];

/// The default layout of the buttons, in lookup order.
pub fn default_controls() -> [Control; CONTROL_COUNT] {
    use Behavior::*;
    [
        Control::new(id::TAP, TapTempoTuner { cc: 14, tuner_cc: 107 }),
        Control::new(id::DELAY, ToggleButtonLed { cc: 28 }),
        Control::new(id::MODULATION, ToggleButtonLed { cc: 50 }),
        Control::new(id::PITCH, ToggleButtonLed { cc: 113 }),
        Control::new(id::REVERB, ToggleButtonLed { cc: 36 }),
        Control::new(id::AMP2, ToggleButtonLed { cc: 112 }),
        Control::new(id::AMP1, ToggleButtonLed { cc: 111 }),
        Control::new(id::CHAN_FAV, ToggleButtonLed { cc: 52 }),
        Control::new(id::CHAN_D, PresetSelect { offset: 3 }),
        Control::new(id::CHAN_C, PresetSelect { offset: 2 }),
        Control::new(id::CHAN_B, PresetSelect { offset: 1 }),
        Control::new(id::CHAN_A, PresetSelect { offset: 0 }),
        Control::new(id::BANK_UP, BankSwitch(Direction::Up)),
        Control::new(id::BANK_DOWN, BankSwitch(Direction::Down)),
        Control::new(id::STOMP3, ToggleButtonLed { cc: 110 }),
        Control::new(id::STOMP2, ToggleButtonLed { cc: 109 }),
        Control::new(id::STOMP1, ToggleButtonLed { cc: 25 }),
        Control::new(id::FX_LOOP, ToggleButtonLed { cc: 107 }),
        Control::new(id::VOLUME_BUTTON, ContinuousPedal(Pedal::Volume)),
        Control::new(id::WAH_BUTTON, ContinuousPedal(Pedal::Wah)),
    ]
}

/// The default setup of the expression pedals, indexed by [`Pedal::index`].
pub fn default_pedals() -> [ContinuousControl; 2] {
    [
        ContinuousControl {
            foot_id: id::WAH_VALUE,
            button_id: id::WAH_BUTTON,
            led_a: id::WAH_LED,
            led_b: id::PEDAL1_LED,
            cc: 43,
            cc_low: 126,
            cc_high: 2,
            toggle: Toggle::Off,
            blocks: BlockBindings::default(),
        },
        ContinuousControl {
            foot_id: id::VOLUME_VALUE,
            button_id: id::VOLUME_BUTTON,
            led_a: id::PEDAL2_LED,
            led_b: id::VOLUME_LED,
            cc: 105,
            cc_low: 125,
            cc_high: 7,
            toggle: Toggle::Off,
            blocks: BlockBindings::default(),
        },
    ]
}
