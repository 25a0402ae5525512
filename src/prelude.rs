//! Prelude (helpful reexports) for this package

pub use crate::{
    codec::ByteOrder,
    device::{
        Device,
        DeviceConfig,
    },
    transport::{
        mock::Mock,
        Transport,
    },
};
pub use regfile::{
    Field,
    Register,
    RegisterBlock,
    RegisterFile,
};
