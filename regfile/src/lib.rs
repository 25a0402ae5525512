//! # Register files
//!
//! Reader for flat binary register description files. A register file describes a hierarchy of
//! register blocks, registers and bit fields in a single relocatable byte region, so it can be
//! memory mapped and queried in place without building any owned tree.
//!
//! ```no_run
//! # fn main() -> regfile::Result<()> {
//! let rf = regfile::RegisterFile::open("omap5.bin")?;
//! let reg = rf.get_register("DISPC_CONTROL1")?;
//! println!("{} @ {:#x}, {} bytes", reg.name()?, reg.address(), reg.size());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod file;
#[cfg(any(test, feature = "fixture"))]
pub mod fixture;
pub mod views;

pub use data::RegisterFileData;
pub use error::{
    Error,
    Kind,
    Result,
};
pub use file::RegisterFile;
pub use views::{
    Field,
    Register,
    RegisterBlock,
};
