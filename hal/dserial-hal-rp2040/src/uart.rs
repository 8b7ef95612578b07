//! UART peripheral allocation and bus port setup
//!
//! RP2040 has two UART peripherals (UART0 and UART1). A board may run a
//! bus on each, so this module tracks which are taken.

use dserial_hal::uart::{DataBits, Parity, StopBits};
use dserial_hal::{IoUart, UartConfig};
use embassy_rp::uart as rp;
use embedded_io::{Read, ReadReady, Write};

/// UART peripheral identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartId {
    Uart0,
    Uart1,
}

/// Returned when a UART is claimed twice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartInUse(pub UartId);

/// UART allocation state
#[derive(Debug, Default)]
pub struct UartAllocator {
    uart0_allocated: bool,
    uart1_allocated: bool,
}

impl UartAllocator {
    /// Create a new UART allocator
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, id: UartId) -> &mut bool {
        match id {
            UartId::Uart0 => &mut self.uart0_allocated,
            UartId::Uart1 => &mut self.uart1_allocated,
        }
    }

    /// Claim a UART peripheral
    pub fn allocate(&mut self, id: UartId) -> Result<(), UartInUse> {
        let slot = self.slot(id);
        if *slot {
            return Err(UartInUse(id));
        }
        *slot = true;
        Ok(())
    }

    /// Release a UART peripheral
    pub fn release(&mut self, id: UartId) {
        *self.slot(id) = false;
    }
}

/// Determine which UART can use a given GPIO pin
pub fn gpio_to_uart(gpio: u8) -> Option<UartId> {
    // UART0: GPIO 0/1, 12/13, 16/17, 28/29
    // UART1: GPIO 4/5, 8/9, 20/21, 24/25
    match gpio {
        0 | 1 | 12 | 13 | 16 | 17 | 28 | 29 => Some(UartId::Uart0),
        4 | 5 | 8 | 9 | 20 | 21 | 24 | 25 => Some(UartId::Uart1),
        _ => None,
    }
}

/// Translate bus UART settings into an embassy-rp configuration
pub fn uart_config(config: &UartConfig) -> rp::Config {
    let mut rp_config = rp::Config::default();
    rp_config.baudrate = config.baudrate;
    rp_config.data_bits = match config.data_bits {
        DataBits::Seven => rp::DataBits::DataBits7,
        DataBits::Eight => rp::DataBits::DataBits8,
    };
    rp_config.parity = match config.parity {
        Parity::None => rp::Parity::ParityNone,
        Parity::Even => rp::Parity::ParityEven,
        Parity::Odd => rp::Parity::ParityOdd,
    };
    rp_config.stop_bits = match config.stop_bits {
        StopBits::One => rp::StopBits::STOP1,
        StopBits::Two => rp::StopBits::STOP2,
    };
    rp_config
}

/// Wrap a buffered UART (or either half pair joined back together) as a
/// bus port for a session
///
/// ```ignore
/// let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config(&UartConfig::default()));
/// let port = bus_port(uart.into_buffered(Irqs, tx_buf, rx_buf));
/// let mut master = MasterSession::new(port, EmbassyClock);
/// ```
pub fn bus_port<T: Read + ReadReady + Write>(uart: T) -> IoUart<T> {
    IoUart::new(uart)
}
