//! RP2040 binding for the DSerial bus
//!
//! This crate provides RP2040-specific implementations:
//! - UART peripheral selection from GPIO pins
//! - Conversion of the bus UART settings to embassy-rp's
//! - Bus port over a buffered UART
//! - Millisecond clock backed by embassy-time

#![no_std]

pub mod clock;
pub mod uart;

pub use clock::EmbassyClock;
pub use uart::{bus_port, gpio_to_uart, uart_config, UartAllocator, UartId};
