//! FBV Bridge is [Embassy](https://embassy.dev)-based firmware for a MIDI adapter which lets a Line 6 FBV floor
//! controller drive a Fractal Audio Axe-FX. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series
//! STM32 microcontroller.
//!
//! The floor controller hangs off USART2, the effects unit's MIDI ports off USART3 and a computer (or anything else
//! that speaks USB-MIDI) off the USB OTG port. Presses and pedal sweeps are sent as Control and Program Changes to both
//! MIDI destinations; the effects unit's SysEx reports come back as LEDs, patch names and tuner readouts on the floor
//! controller.
//!
//! All of the protocol handling lives in `fbv_bridge_lib`; this crate only moves bytes between peripherals and the
//! [`Engine`].

#![no_std]
#![no_main]

mod fbv_link;

use crate::fbv_link::{FBV_LINK, RX_DMA_LEN, fbv_rx, fbv_tx};
use defmt::{panic, *};
use embassy_executor::Spawner;
use embassy_stm32::{
    Config, bind_interrupts,
    mode::Async,
    peripherals,
    time::Hertz,
    usart::{self, RingBufferedUartRx, Uart, UartTx},
    usb,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Ticker};
use embassy_usb::{
    Builder, UsbDevice,
    class::midi::{MidiClass, Receiver, Sender},
    driver::EndpointError,
};
use fbv_bridge_lib::{
    axefx::SysexParser,
    configuration::{self, MidiPort},
    dispatch::{Action, Actions, Engine, TICK_PERIOD},
    fbv::FbvDecoder,
    midi::{self, Destination},
    shared::SharedEngine,
};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
        USART2 => usart::InterruptHandler<peripherals::USART2>;
        USART3 => usart::InterruptHandler<peripherals::USART3>;
    }
);

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// Baud rate of both the floor controller link and serial MIDI.
const MIDI_BAUD_RATE: u32 = 31_250;

/// How often the floor controller's receive buffer is drained.
const POLL_PERIOD: Duration = Duration::from_millis(1);

/// USB-MIDI cable of the primary destination.
const USB_CABLE: u8 = 0;

/// Size of the DMA buffer backing the effects unit's receive direction; block reports arrive in bursts.
const SYSEX_DMA_LEN: usize = 256;

const ACTION_QUEUE_LEN: usize = 32;

/// Everything the engine decided on, waiting to be put on the wire by [`output_task`].
static ACTIONS: Channel<CriticalSectionRawMutex, Action, ACTION_QUEUE_LEN> = Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing FBV Bridge");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410, the 48MHz clock used for USB OTG FS is derived from main PLL VCO (PLLQ clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = MIDI_BAUD_RATE;

    // floor controller: TX on PD5, RX on PD6
    let fbv_uart = unwrap!(Uart::new(
        p.USART2,
        p.PD6,
        p.PD5,
        Irqs,
        p.DMA1_CH6,
        p.DMA1_CH5,
        uart_config
    ));
    let (fbv_tx_half, fbv_rx_half) = fbv_uart.split();
    static FBV_RX_DMA: StaticCell<[u8; RX_DMA_LEN]> = StaticCell::new();
    let fbv_rx_half = fbv_rx_half.into_ring_buffered(FBV_RX_DMA.init([0; RX_DMA_LEN]));

    // effects unit: TX on PB10, RX on PB11 (PD8/PD9 are taken by the ST-LINK virtual COM port)
    let axefx_uart = unwrap!(Uart::new(
        p.USART3,
        p.PB11,
        p.PB10,
        Irqs,
        p.DMA1_CH3,
        p.DMA1_CH1,
        uart_config
    ));
    let (axefx_tx, axefx_rx) = axefx_uart.split();
    static AXEFX_RX_DMA: StaticCell<[u8; SYSEX_DMA_LEN]> = StaticCell::new();
    let axefx_rx = axefx_rx.into_ring_buffered(AXEFX_RX_DMA.init([0; SYSEX_DMA_LEN]));

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    let product_id = 0xFB70;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Pawpaw Works");
    config.product = Some("FBV Bridge");
    config.self_powered = true;
    config.max_power = 0;

    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    let class = MidiClass::new(&mut builder, 1, 1, 64);
    let usb = builder.build();
    let (usb_sender, usb_receiver) = class.split();

    static ENGINE: StaticCell<SharedEngine> = StaticCell::new();
    let engine: &'static SharedEngine = ENGINE.init(SharedEngine::new(Engine::new(configuration::Config::default())));

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(fbv_rx(fbv_rx_half)));
    unwrap!(spawner.spawn(fbv_tx(fbv_tx_half)));
    unwrap!(spawner.spawn(output_task(usb_sender, axefx_tx, engine)));

    enqueue(engine.lock(|engine| engine.startup())).await;

    unwrap!(spawner.spawn(poll_task(engine)));
    unwrap!(spawner.spawn(tick_task(engine)));
    unwrap!(spawner.spawn(axefx_task(axefx_rx, engine)));
    unwrap!(spawner.spawn(usb_sysex_task(usb_receiver, engine)));
}

async fn enqueue(actions: Actions) {
    for action in actions {
        ACTIONS.send(action).await;
    }
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Decodes frames from the floor controller and feeds them to the engine.
#[embassy_executor::task]
async fn poll_task(engine: &'static SharedEngine) -> ! {
    let mut decoder = FbvDecoder::new();
    let mut ticker = Ticker::every(POLL_PERIOD);
    loop {
        while let Some(message) = decoder.next_message(FBV_LINK.rx()) {
            debug!("FBV message: {}", message);
            enqueue(engine.lock(|engine| engine.handle_fbv(&message))).await;
        }
        ticker.next().await;
    }
}

/// Drives the engine's blink and hold timers.
#[embassy_executor::task]
async fn tick_task(engine: &'static SharedEngine) -> ! {
    let mut ticker = Ticker::every(TICK_PERIOD);
    loop {
        let actions = engine.lock(|engine| engine.tick());
        if !actions.is_empty() {
            enqueue(actions).await;
        }
        ticker.next().await;
    }
}

/// Parses SysEx arriving on the serial MIDI input.
#[embassy_executor::task]
async fn axefx_task(mut rx: RingBufferedUartRx<'static>, engine: &'static SharedEngine) -> ! {
    let mut parser = SysexParser::new();
    let mut buf = [0; SYSEX_DMA_LEN];
    loop {
        let n = match rx.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("MIDI receive error: {}", e);
                continue;
            }
        };
        let effects_port = engine.lock(|engine| engine.config().effects_port);
        for &b in &buf[..n] {
            // a single serial MIDI port is fitted
            if let Some(command) = parser.feed(MidiPort::Serial(1), effects_port, b) {
                debug!("Effects unit report: {}", command);
                enqueue(engine.lock(|engine| engine.handle_sysex(&command))).await;
            }
        }
    }
}

/// Parses SysEx arriving over USB, for an effects unit attached to the computer rather than the serial port.
#[embassy_executor::task]
async fn usb_sysex_task(mut receiver: Receiver<'static, UsbDriver>, engine: &'static SharedEngine) -> ! {
    let mut parser = SysexParser::new();
    let mut buf = [0; 64];
    loop {
        receiver.wait_connection().await;
        info!("USB connected");
        loop {
            let n = match receiver.read_packet(&mut buf).await {
                Ok(n) => n,
                Err(EndpointError::Disabled) => break,
                Err(EndpointError::BufferOverflow) => {
                    warn!("USB packet larger than {} bytes", buf.len());
                    continue;
                }
            };
            let effects_port = engine.lock(|engine| engine.config().effects_port);
            for packet in buf[..n].chunks_exact(4) {
                let mut event = [0; 4];
                event.copy_from_slice(packet);
                let (cable, bytes) = midi::usb_payload(&event);
                for &b in bytes {
                    if let Some(command) = parser.feed(MidiPort::Usb(cable), effects_port, b) {
                        debug!("Effects unit report over USB: {}", command);
                        enqueue(engine.lock(|engine| engine.handle_sysex(&command))).await;
                    }
                }
            }
        }
        info!("USB disconnected");
    }
}

/// Carries out queued [`Action`]s, in order.
#[embassy_executor::task]
async fn output_task(
    mut usb: Sender<'static, UsbDriver>,
    mut serial: UartTx<'static, Async>,
    engine: &'static SharedEngine,
) -> ! {
    let effects_port = engine.lock(|engine| engine.config().effects_port);
    loop {
        match ACTIONS.receive().await {
            Action::Fbv(command) => {
                if FBV_LINK.send(command.encode().as_slice()).await.is_err() {
                    error!("Dropping FBV command {}", command);
                }
            }
            Action::Midi(Destination::Primary, message) => match midi::usb_packet(USB_CABLE, &message) {
                Some(packet) => write_usb(&mut usb, &packet).await,
                None => warn!("Message has no USB-MIDI packet: {}", Debug2Format(&message)),
            },
            Action::Midi(Destination::Secondary, message) => {
                let mut bytes = [0; 3];
                match midi::serial_bytes(&message, &mut bytes) {
                    Some(n) => write_serial(&mut serial, &bytes[..n]).await,
                    None => warn!("Message too long for serial MIDI: {}", Debug2Format(&message)),
                }
            }
            Action::SysEx(request) => match effects_port {
                MidiPort::Serial(_) => write_serial(&mut serial, request.bytes()).await,
                MidiPort::Usb(cable) => {
                    for packet in midi::usb_sysex_packets(cable, request.bytes()) {
                        write_usb(&mut usb, &packet).await;
                    }
                }
            },
        }
    }
}

async fn write_serial(serial: &mut UartTx<'static, Async>, bytes: &[u8]) {
    if let Err(e) = serial.write(bytes).await {
        warn!("MIDI transmit error: {}", e);
    }
}

/// Sends a USB-MIDI packet. Without a host listening the packet is lost, which is fine: every message is a snapshot.
async fn write_usb(usb: &mut Sender<'static, UsbDriver>, packet: &[u8]) {
    match usb.write_packet(packet).await {
        Ok(()) => {}
        Err(EndpointError::Disabled) => trace!("USB not connected, dropping packet"),
        Err(EndpointError::BufferOverflow) => panic!("Buffer overflow"),
    }
}
