//! DSerial Hardware Abstraction Layer
//!
//! This crate defines the boundary between the bus protocol and the
//! hardware it runs on: a duplex byte stream and a monotonic millisecond
//! clock. Chip-specific crates implement these traits so the same session
//! code can drive a real UART or a simulated bus on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Sessions (dserial-core)                │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dserial-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ dserial-hal-  │       │  host sim /   │
//! │    rp2040     │       │  embedded-io  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Non-blocking serial byte stream
//! - [`time::Clock`] - Monotonic millisecond counter

#![no_std]
#![deny(unsafe_code)]

pub mod io;
pub mod time;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use io::IoUart;
pub use time::Clock;
pub use uart::{Uart, UartConfig, UartRx, UartTx};
