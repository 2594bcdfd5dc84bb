//! The dispatch engine: turns floor controller events and effects unit reports into MIDI traffic and feedback for the
//! floor controller, keeping the LEDs, the block states and the outgoing MIDI consistent with each other.
//!
//! Handlers never perform I/O. Each returns the [`Actions`] it decided on, so the caller may release whatever lock
//! guards the [`Engine`] before putting anything on the wire.

mod scheduler;
pub use scheduler::*;

mod tuner;

use crate::{
    axefx::{Request, SysexCommand, Variant, control_for_block, report},
    configuration::{Config, Cycle, Toggle},
    control::{
        BANK_IDS, Behavior, BlockBinding, CONTROL_COUNT, ContinuousControl, Control, Direction, Pedal, default_controls,
        default_pedals,
    },
    fbv::{DisplayText, FbvCommand, FbvEvent, FbvMessage, id},
    midi::{Destination, control_change, program_change},
};
use tinyvec::ArrayVec;
use wmidi::{Channel, MidiMessage};

/// Most actions a single handler may produce.
pub const MAX_ACTIONS: usize = 64;

/// Something the engine wants done.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Send a command to the floor controller.
    Fbv(FbvCommand),
    /// Send a MIDI message.
    Midi(Destination, MidiMessage<'static>),
    /// Send a request to the effects unit.
    SysEx(Request),
}

/// Only exists because [`Actions`] is backed by an `ArrayVec`, which needs a value for its unused slots. The filler
/// is never visible through [`Actions`]; don't build actions from it.
#[doc(hidden)]
impl Default for Action {
    fn default() -> Self {
        Self::Fbv(FbvCommand::Init)
    }
}

/// The ordered output of a handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Actions(ArrayVec<[Action; MAX_ACTIONS]>);

impl Actions {
    /// Constructs an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action. Once [`MAX_ACTIONS`] is reached, further actions are dropped.
    pub fn push(&mut self, action: Action) {
        if self.0.try_push(action).is_some() {
            warn!("Dropping action, more than {} produced at once", MAX_ACTIONS);
        }
    }

    /// The actions, in the order they should be carried out.
    pub fn as_slice(&self) -> &[Action] {
        self.0.as_slice()
    }

    /// Iterates over the actions in order.
    pub fn iter(&self) -> core::slice::Iter<'_, Action> {
        self.0.iter()
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn fbv(&mut self, command: FbvCommand) {
        self.push(Action::Fbv(command));
    }

    fn led(&mut self, id: u8, on: bool) {
        self.fbv(FbvCommand::Led { id, on });
    }

    fn request(&mut self, request: Request) {
        self.push(Action::SysEx(request));
    }

    fn control_change(&mut self, channel: Channel, cc: u8, value: u8) {
        for destination in Destination::ALL {
            self.push(Action::Midi(destination, control_change(channel, cc, value)));
        }
    }

    fn program_change(&mut self, channel: Channel, program: u8) {
        for destination in Destination::ALL {
            self.push(Action::Midi(destination, program_change(channel, program)));
        }
    }
}

impl IntoIterator for Actions {
    type Item = Action;
    type IntoIter = tinyvec::ArrayVecIterator<[Action; MAX_ACTIONS]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Preset addressing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BankState {
    /// Absolute number of the active preset.
    pub channel: u8,
    /// Bank shown on the display. Differs from the active preset's bank while browsing with the bank buttons.
    pub bank: u8,
    /// Presets per bank.
    pub bank_size: u8,
}

impl BankState {
    /// `true` while the displayed bank isn't the one the active preset belongs to.
    pub fn is_browsing(&self) -> bool {
        self.channel / self.bank_size != self.bank
    }

    /// Bank indicator buttons in use.
    pub fn indicators(&self) -> &'static [u8] {
        &BANK_IDS[..usize::from(self.bank_size)]
    }

    /// The bank indicator button of the active preset.
    pub fn active_indicator(&self) -> u8 {
        BANK_IDS[usize::from(self.channel % self.bank_size)]
    }
}

/// Whether the tap button is held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TapStatus {
    /// Held down, counting towards the tuner.
    Pressed,
    /// Up, or held long enough to have engaged the tuner.
    #[default]
    Released,
}

/// Tap tempo and tuner bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TempoTunerState {
    /// State of the tap button.
    pub status: TapStatus,
    /// Groups of [`GROUP_TICKS`] ticks the tap button has been held for.
    pub hold_ticks: u16,
    /// Groups of ticks left until the tempo flash goes dark; zero when there is no flash.
    pub led_flash: u8,
    /// Control Change number engaging the tuner, if the tap button held last can engage one.
    pub tuner_cc: Option<u8>,
}

/// Firmware version of the effects unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    /// Unit that reported.
    pub variant: Variant,
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl FirmwareVersion {
    /// Renders the version the way the display would show it, e.g. `Axe-FX Ult v1.02`.
    pub fn text(&self) -> DisplayText {
        let mut text = match self.variant {
            Variant::Standard => *b"Axe-FX Std v0.00",
            Variant::Ultra => *b"Axe-FX Ult v0.00",
        };
        // a two digit major version takes the place of the `v`
        if self.major > 9 {
            text[11] = b'0' + (self.major / 10) % 10;
        }
        text[12] = b'0' + self.major % 10;
        text[14] = b'0' + (self.minor / 10) % 10;
        text[15] = b'0' + self.minor % 10;
        text
    }
}

/// State shared by every handler: the control registry, preset addressing and tap tempo bookkeeping.
pub struct Engine {
    config: Config,
    controls: [Control; CONTROL_COUNT],
    pedals: [ContinuousControl; 2],
    bank: BankState,
    tempo: TempoTunerState,
    firmware: Option<FirmwareVersion>,
    flash_counter: u16,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    /// Constructs an engine with the default control layout, on preset zero.
    ///
    /// A bank size outside `1..=10` is clamped, as there are only ten buttons to indicate the preset with.
    pub fn new(config: Config) -> Self {
        let bank_size = config.bank_size.clamp(1, BANK_IDS.len() as u8);
        Self {
            config: Config { bank_size, ..config },
            controls: default_controls(),
            pedals: default_pedals(),
            bank: BankState {
                channel: 0,
                bank: 0,
                bank_size,
            },
            tempo: TempoTunerState::default(),
            firmware: None,
            flash_counter: 0,
        }
    }

    /// The settings in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every button, in lookup order.
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// The button with the given identifier.
    pub fn control(&self, id: u8) -> Option<&Control> {
        self.controls.iter().find(|control| control.id == id)
    }

    /// One of the expression pedals.
    pub fn pedal(&self, pedal: Pedal) -> &ContinuousControl {
        &self.pedals[pedal.index()]
    }

    /// Preset addressing.
    pub fn bank(&self) -> &BankState {
        &self.bank
    }

    /// Tap tempo and tuner bookkeeping.
    pub fn tempo(&self) -> &TempoTunerState {
        &self.tempo
    }

    /// Firmware version of the effects unit, once reported.
    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// What to do once the adapter has come up: show the bank and greeting, recall the current preset and ask the
    /// effects unit about it.
    pub fn startup(&mut self) -> Actions {
        let mut actions = Actions::new();
        actions.fbv(FbvCommand::bank(self.bank.bank));
        actions.led(self.bank.active_indicator(), true);
        actions.fbv(FbvCommand::Display(self.config.greeting));
        actions.program_change(self.config.midi_channel, self.bank.channel);
        actions.request(Request::Version);
        actions.request(Request::Blocks);
        actions.request(Request::PatchName);
        actions
    }

    /// Handles a frame received from the floor controller.
    pub fn handle_fbv(&mut self, message: &FbvMessage) -> Actions {
        let mut actions = Actions::new();
        match message.event() {
            Some(FbvEvent::Init) => self.on_init(&mut actions),
            Some(FbvEvent::Button { id, pressed: true }) => self.on_press(id, &mut actions),
            Some(FbvEvent::Button { id, pressed: false }) => self.on_release(id, &mut actions),
            Some(FbvEvent::Pedal { pedal, position }) => self.on_pedal(pedal, position, &mut actions),
            None => trace!("Ignoring FBV message {}", message),
        }
        actions
    }

    /// Handles a message received from the effects unit.
    pub fn handle_sysex(&mut self, command: &SysexCommand) -> Actions {
        let mut actions = Actions::new();
        if command.is_truncated() {
            warn!(
                "AxeFX message {=u8:#x} truncated to {} of {} bytes",
                command.cmd,
                command.payload().len(),
                command.len()
            );
        }
        match command.cmd {
            report::TUNER => {
                for frame in tuner::render(command.payload()) {
                    actions.fbv(frame);
                }
            }
            report::BLOCKS => self.on_blocks(command.payload(), &mut actions),
            report::PATCH_NAME => actions.fbv(FbvCommand::display(command.payload())),
            report::VERSION => self.on_version(command),
            report::TEMPO => self.on_tempo(&mut actions),
            cmd => trace!("Ignoring AxeFX command {=u8:#x}", cmd),
        }
        actions
    }

    /// The floor controller was (re)powered: repeat the handshake and bring its LEDs and display up to date.
    fn on_init(&mut self, actions: &mut Actions) {
        info!("FBV initialized");
        actions.fbv(FbvCommand::Init);
        actions.fbv(FbvCommand::bank(self.bank.bank));
        actions.led(id::CHAN_A, true);
        for &indicator in self.bank.indicators() {
            actions.led(indicator, false);
        }
        actions.led(self.bank.active_indicator(), true);
        actions.request(Request::Version);
        actions.request(Request::Blocks);
        actions.request(Request::PatchName);
    }

    fn on_press(&mut self, id: u8, actions: &mut Actions) {
        let channel = self.config.midi_channel;
        // first match wins
        let Some(index) = self.controls.iter().position(|control| control.id == id) else {
            debug!("No control for FBV button {=u8:#x}", id);
            return;
        };

        match self.controls[index].behavior {
            Behavior::ToggleButtonLed { cc } => {
                let control = &mut self.controls[index];
                control.toggle = control.toggle.cycle();
                debug!("FBV button {=u8:#x} to {}", id, control.toggle);
                actions.control_change(channel, cc, control.toggle.cc_value());
                actions.led(control.id, control.toggle.is_on());
                flip_blocks(control.blocks.iter_mut(), channel, actions);
            }
            Behavior::BankSwitch(direction) => {
                let last_bank = self.config.last_bank;
                self.bank.bank = match (direction, self.bank.bank) {
                    (Direction::Down, 0) => last_bank,
                    (Direction::Down, bank) => bank - 1,
                    (Direction::Up, bank) if bank >= last_bank => 0,
                    (Direction::Up, bank) => bank + 1,
                };
                actions.fbv(FbvCommand::bank(self.bank.bank));
            }
            Behavior::PresetSelect { offset } => self.select_preset(id, offset, actions),
            Behavior::TapTempo { cc } => self.tap(cc, None, actions),
            Behavior::TapTempoTuner { cc, tuner_cc } => self.tap(cc, Some(tuner_cc), actions),
            Behavior::ContinuousPedal(pedal) => {
                let pedal = &mut self.pedals[pedal.index()];
                pedal.toggle = pedal.toggle.cycle();
                actions.control_change(channel, pedal.cc, pedal.toggle.cc_value());
                actions.led(pedal.led_a, !pedal.toggle.is_on());
                actions.led(pedal.led_b, pedal.toggle.is_on());
                flip_blocks(pedal.blocks.iter_mut(), channel, actions);
            }
        }
    }

    fn select_preset(&mut self, id: u8, offset: u8, actions: &mut Actions) {
        self.bank.channel = self
            .bank
            .bank
            .saturating_mul(self.bank.bank_size)
            .saturating_add(offset);
        info!("Selecting preset {}", self.bank.channel);
        if self.bank.channel > 0x7F {
            warn!("Preset {} is beyond Program Change range, sending 127", self.bank.channel);
        }

        for &indicator in self.bank.indicators() {
            actions.led(indicator, false);
        }
        actions.led(id, true);
        for control in self.controls.iter_mut().filter(|control| control.is_toggle()) {
            control.toggle = Toggle::Off;
            actions.led(control.id, false);
        }
        actions.program_change(self.config.midi_channel, self.bank.channel);
        actions.request(Request::Blocks);
        actions.request(Request::PatchName);
    }

    fn tap(&mut self, cc: u8, tuner_cc: Option<u8>, actions: &mut Actions) {
        self.tempo.status = TapStatus::Pressed;
        self.tempo.hold_ticks = 0;
        self.tempo.tuner_cc = tuner_cc;
        actions.control_change(self.config.midi_channel, cc, 127);
    }

    fn on_release(&mut self, id: u8, actions: &mut Actions) {
        let Some(control) = self.control(id) else {
            return;
        };
        if !control.is_tap() {
            return;
        }

        // still released here means the hold already engaged the tuner, which this release disengages
        if self.tempo.status == TapStatus::Released {
            if let Some(tuner_cc) = self.tempo.tuner_cc {
                actions.control_change(self.config.midi_channel, tuner_cc, 0);
            }
            actions.fbv(FbvCommand::bank(self.bank.bank));
            actions.request(Request::PatchName);
        }
        self.tempo.status = TapStatus::Released;
        self.tempo.hold_ticks = 0;
    }

    fn on_pedal(&mut self, index: u8, position: u8, actions: &mut Actions) {
        let Some(pedal) = Pedal::from_index(index) else {
            debug!("No pedal {}", index);
            return;
        };
        let cc = self.pedals[pedal.index()].position_cc();
        actions.control_change(self.config.midi_channel, cc, position);
    }

    /// Rebuilds every block binding from a block state report: five byte records of
    /// `<id low nibble> <id high nibble> <cc low nibble> <cc high nibble> <status>`.
    fn on_blocks(&mut self, payload: &[u8], actions: &mut Actions) {
        debug!("AxeFX block states, {} records", payload.len() / 5);
        self.controls.iter_mut().for_each(|control| control.blocks.clear());
        self.pedals.iter_mut().for_each(|pedal| pedal.blocks.clear());

        for record in payload.chunks_exact(5) {
            let binding = BlockBinding {
                block: u16::from(record[0]) + u16::from(record[1]) * 0x10,
                cc: u16::from(record[2]) + u16::from(record[3]) * 0x10,
                state: Toggle::from_status(record[4]),
            };
            trace!("AxeFX block {}", binding);

            let Some(target) = control_for_block(binding.block) else {
                trace!("Block {} not used", binding.block);
                continue;
            };
            let Some(control) = self.controls.iter_mut().find(|control| control.id == target) else {
                continue;
            };

            match control.behavior {
                Behavior::ToggleButtonLed { .. } => {
                    let first = control.blocks.is_empty();
                    if control.blocks.try_push(binding).is_err() {
                        warn!("Too many blocks for FBV button {=u8:#x}", control.id);
                        continue;
                    }
                    if first {
                        control.toggle = binding.state;
                        actions.led(control.id, binding.state.is_on());
                    }
                }
                Behavior::ContinuousPedal(pedal) => {
                    let pedal = &mut self.pedals[pedal.index()];
                    let first = pedal.blocks.is_empty();
                    if pedal.blocks.try_push(binding).is_err() {
                        warn!("Too many blocks for pedal {=u8:#x}", pedal.foot_id);
                        continue;
                    }
                    if first {
                        pedal.toggle = binding.state;
                        actions.led(pedal.led_a, !binding.state.is_on());
                        actions.led(pedal.led_b, binding.state.is_on());
                    }
                }
                _ => {}
            }
        }
    }

    fn on_version(&mut self, command: &SysexCommand) {
        let &[major, minor, ..] = command.payload() else {
            warn!("AxeFX version report too short");
            return;
        };
        let version = FirmwareVersion {
            variant: command.variant,
            major,
            minor,
        };
        info!("AxeFX {} firmware {}.{}", version.variant, major, minor);
        self.firmware = Some(version);
    }

    fn on_tempo(&mut self, actions: &mut Actions) {
        self.tempo.led_flash = TEMPO_FLASH_GROUPS;
        if let Some(tap) = self.controls.iter().find(|control| control.is_tap()) {
            actions.led(tap.id, true);
        }
    }
}

/// Flips each bound block on its own, switching those which have a Control Change of their own.
fn flip_blocks<'a>(blocks: impl Iterator<Item = &'a mut BlockBinding>, channel: Channel, actions: &mut Actions) {
    for block in blocks {
        block.state = block.state.cycle();
        match block.direct_cc() {
            Some(cc) => actions.control_change(channel, cc, block.state.cc_value()),
            None => debug!("Block {} has no Control Change of its own", block.block),
        }
    }
}

/// Shows a dashed channel readout, used while the tuner is engaged.
fn tuner_channel() -> FbvCommand {
    FbvCommand::Channel {
        group: b'-',
        digits: [b'-', b'-'],
    }
}
