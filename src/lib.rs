//! # rwmem
//!
//! Register access for devices that sit behind an addressed bus (I2C peripherals and the like).
//! Registers are looked up by name or address in a [`regfile::RegisterFile`] and read or written
//! through a [`Device`], which frames the address and data phases with the configured widths and
//! [`ByteOrder`]s and hands the raw bytes to a [`Transport`](transport::Transport).
//!
//! ```
//! use rwmem::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let bus = Mock::new(ByteOrder::Big).map(0x40, 4);
//! let config = DeviceConfig::default().with_data(2, ByteOrder::Little);
//! let mut dev = Device::new(bus, config)?;
//! dev.write(0x40, 0, 0xAABB)?;
//! assert_eq!(dev.read(0x40, 0)?, 0xAABB);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod device;
pub mod error;
pub mod prelude;
pub mod transport;

pub use codec::ByteOrder;
pub use device::{
    Device,
    DeviceConfig,
};
pub use error::{
    Error,
    Result,
};
pub use regfile;
