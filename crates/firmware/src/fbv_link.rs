//! The serial link to the floor controller.
//!
//! The UART is serviced by two pump tasks standing in for an interrupt service routine: one copies received bytes into
//! the transport's receive buffer, the other drains its transmit buffer onto the wire whenever the transport arms it.

use defmt::*;
use embassy_stm32::{
    mode::Async,
    usart::{self, RingBufferedUartRx, UartTx},
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use fbv_bridge_lib::transport::{SerialTransport, TxInterrupt};

/// Size of the DMA buffer backing the receive direction.
pub const RX_DMA_LEN: usize = 64;

/// Largest burst handed to the UART in one write.
const TX_CHUNK_LEN: usize = 32;

/// Wakes the transmit pump; takes the place of the UART's transmit-ready interrupt.
pub struct TxPump {
    armed: Signal<CriticalSectionRawMutex, ()>,
}

impl TxPump {
    pub const fn new() -> Self {
        Self {
            armed: Signal::new(),
        }
    }
}

impl TxInterrupt for TxPump {
    fn enable(&self) {
        self.armed.signal(());
    }

    fn disable(&self) {
        // the pump parks by itself once the buffer runs dry; resetting here could swallow a concurrent enable
    }
}

pub type FbvLink = SerialTransport<TxPump>;

/// The floor controller link, shared by the pumps and by whoever sends frames.
pub static FBV_LINK: FbvLink = SerialTransport::new(TxPump::new());

/// Copies bytes received from the floor controller into [`FBV_LINK`].
#[embassy_executor::task]
pub async fn fbv_rx(mut rx: RingBufferedUartRx<'static>) -> ! {
    let mut buf = [0; RX_DMA_LEN];
    loop {
        match rx.read(&mut buf).await {
            Ok(n) => buf[..n].iter().for_each(|&b| FBV_LINK.rx_byte_available(b)),
            Err(usart::Error::Overrun) => warn!("FBV receive overrun"),
            Err(e) => warn!("FBV receive error: {}", e),
        }
    }
}

/// Puts the bytes queued in [`FBV_LINK`] on the wire.
#[embassy_executor::task]
pub async fn fbv_tx(mut tx: UartTx<'static, Async>) -> ! {
    let mut chunk = [0; TX_CHUNK_LEN];
    loop {
        FBV_LINK.tx_interrupt().armed.wait().await;
        loop {
            let mut n = 0;
            while n < chunk.len() {
                match FBV_LINK.tx_next_byte() {
                    Some(b) => {
                        chunk[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            if n == 0 {
                break;
            }
            if let Err(e) = tx.write(&chunk[..n]).await {
                warn!("FBV transmit error: {}", e);
            }
        }
    }
}
