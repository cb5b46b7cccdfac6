//! Driver for the LX-D02 (Dolebo) Bluetooth-LE thermal printer.
//!
//! 58 mm paper, 203 DPI, 384-pixel scan lines. The driver turns a raster
//! image into the printer's 100-byte two-line packet stream and pushes it
//! over a [`link::Link`] while reacting to the device's asynchronous
//! status, hold, retransmit and finished notifications.
//!
//! Transport is pluggable: the `lxd02-ble` crate provides the real
//! Bluetooth implementation, [`link::NullLink`] serves dry runs and tests.

pub mod cmd;
mod driver;
pub mod error;
pub mod link;
pub mod patterns;
pub mod raster;
mod session;
pub mod status;

pub use driver::{Lxd02, Lxd02Options};
pub use error::{Error, Result};
pub use raster::Raster;
pub use session::DEFAULT_PRINT_INTERVAL;
