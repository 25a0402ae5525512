//! The addressable device: width- and byte order-aware reads and writes over a [`Transport`]

use crate::{
    codec::{
        self,
        ByteOrder,
    },
    error::{
        Error,
        Result,
    },
    transport::Transport,
};
use anyhow::anyhow;
use paste::paste;
use regfile::{
    Field,
    Register,
};
use tracing::{
    debug,
    warn,
};

/// Largest supported address or data width in bytes
const MAX_WIDTH: usize = 8;

/// How logical addresses and values are put on the bus
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Added to every address before it is encoded
    pub base_offset: u64,
    /// Number of bytes in the address phase
    pub address_width: usize,
    pub address_order: ByteOrder,
    /// Data width used when an access asks for width 0
    pub data_width: usize,
    pub data_order: ByteOrder,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_offset: 0,
            address_width: 1,
            address_order: ByteOrder::Big,
            data_width: 4,
            data_order: ByteOrder::Big,
        }
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn with_base_offset(mut self, base_offset: u64) -> Self {
        self.base_offset = base_offset;
        self
    }

    #[must_use]
    pub fn with_address(mut self, width: usize, order: ByteOrder) -> Self {
        self.address_width = width;
        self.address_order = order;
        self
    }

    #[must_use]
    pub fn with_data(mut self, width: usize, order: ByteOrder) -> Self {
        self.data_width = width;
        self.data_order = order;
        self
    }
}

macro_rules! access_num {
    ($num:ty) => {
        paste! {
            #[doc = "Read a `" $num "` from `addr`"]
            /// # Errors
            /// Returns an error on bad transport
            #[allow(clippy::cast_possible_truncation)]
            pub fn [<read_ $num>](&mut self, addr: u64) -> Result<$num> {
                // The codec never produces more bits than the width
                Ok(self.read(addr, core::mem::size_of::<$num>())? as $num)
            }

            #[doc = "Write a `" $num "` to `addr`"]
            /// # Errors
            /// Returns an error on bad transport
            pub fn [<write_ $num>](&mut self, addr: u64, value: $num) -> Result<()> {
                self.write(addr, core::mem::size_of::<$num>(), u64::from(value))
            }
        }
    };
}

/// A device on a bus, reached through a transport it owns exclusively.
///
/// Every access is one transaction: an address phase of `address_width` bytes followed by the
/// data phase. Address and data are encoded independently, so registers of any supported width
/// can be accessed regardless of how the device frames its addresses.
#[derive(Debug)]
pub struct Device<T> {
    transport: T,
    config: DeviceConfig,
}

impl<T> Device<T>
where
    T: Transport,
{
    /// Wrap `transport` with the given address and data encodings
    /// # Errors
    /// Returns [`Error::UnsupportedEncoding`] if either the address or the default data encoding
    /// is invalid
    pub fn new(transport: T, config: DeviceConfig) -> Result<Self> {
        codec::check(config.address_width, config.address_order)?;
        codec::check(config.data_width, config.data_order)?;
        Ok(Self { transport, config })
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn resolve_width(&self, width: usize) -> Result<usize> {
        let width = if width == 0 {
            self.config.data_width
        } else {
            width
        };
        codec::check(width, self.config.data_order)?;
        Ok(width)
    }

    /// Encode the bus address for `addr` into the front of `buf`, returning the bus address
    fn encode_address(&self, addr: u64, buf: &mut [u8]) -> u64 {
        let bus_addr = addr.wrapping_add(self.config.base_offset);
        let width = self.config.address_width;
        if !codec::fits(bus_addr, width) {
            warn!("Address {bus_addr:#x} doesn't fit in {width} address bytes, truncating");
        }
        codec::encode(bus_addr, self.config.address_order, &mut buf[..width]);
        bus_addr
    }

    /// Read `width` bytes at `addr` (plus the base offset). A `width` of 0 uses the configured
    /// default data width.
    /// # Errors
    /// Returns [`Error::UnsupportedEncoding`] on a bad width and [`Error::Transport`] if the
    /// transaction fails
    pub fn read(&mut self, addr: u64, width: usize) -> Result<u64> {
        let width = self.resolve_width(width)?;
        let mut addr_buf = [0u8; MAX_WIDTH];
        let bus_addr = self.encode_address(addr, &mut addr_buf);
        let addr_buf = &addr_buf[..self.config.address_width];
        let bytes = self
            .transport
            .transfer(addr_buf, None, width)
            .and_then(|bytes| {
                if bytes.len() == width {
                    Ok(bytes)
                } else {
                    Err(anyhow!(
                        "We asked for {width} bytes but received {}",
                        bytes.len()
                    ))
                }
            })
            .map_err(|source| Error::Transport {
                addr: bus_addr,
                width,
                source,
            })?;
        let value = codec::decode(&bytes, self.config.data_order);
        debug!("Read {value:#x} from {bus_addr:#x} ({width} bytes)");
        Ok(value)
    }

    /// Write the low `width` bytes of `value` at `addr` (plus the base offset). A `width` of 0
    /// uses the configured default data width.
    /// # Errors
    /// Returns [`Error::UnsupportedEncoding`] on a bad width and [`Error::Transport`] if the
    /// transaction fails
    pub fn write(&mut self, addr: u64, width: usize, value: u64) -> Result<()> {
        let width = self.resolve_width(width)?;
        if !codec::fits(value, width) {
            warn!("Value {value:#x} doesn't fit in {width} bytes, truncating");
        }
        // Address and data go out back to back in one message
        let mut buf = [0u8; 2 * MAX_WIDTH];
        let bus_addr = self.encode_address(addr, &mut buf);
        let addr_width = self.config.address_width;
        codec::encode(
            value,
            self.config.data_order,
            &mut buf[addr_width..addr_width + width],
        );
        let (addr_buf, rest) = buf.split_at(addr_width);
        self.transport
            .transfer(addr_buf, Some(&rest[..width]), 0)
            .map_err(|source| Error::Transport {
                addr: bus_addr,
                width,
                source,
            })?;
        debug!("Wrote {value:#x} to {bus_addr:#x} ({width} bytes)");
        Ok(())
    }

    access_num!(u8);
    access_num!(u16);
    access_num!(u32);
    access_num!(u64);

    /// Read a register at its bus address using its natural width
    /// # Errors
    /// Returns an error on bad transport or if the register's size isn't a supported width
    pub fn read_register(&mut self, reg: &Register<'_>) -> Result<u64> {
        self.read(reg.address(), reg.size() as usize)
    }

    /// Write a register at its bus address using its natural width
    /// # Errors
    /// Returns an error on bad transport or if the register's size isn't a supported width
    pub fn write_register(&mut self, reg: &Register<'_>, value: u64) -> Result<()> {
        self.write(reg.address(), reg.size() as usize, value)
    }

    /// Read a register and extract one of its fields
    /// # Errors
    /// Returns an error on bad transport
    pub fn read_field(&mut self, reg: &Register<'_>, field: &Field<'_>) -> Result<u64> {
        Ok(field.extract(self.read_register(reg)?))
    }

    /// Replace one field of a register, leaving the other bits as they are on the device
    /// # Errors
    /// Returns an error on bad transport
    pub fn write_field(&mut self, reg: &Register<'_>, field: &Field<'_>, value: u64) -> Result<()> {
        let current = self.read_register(reg)?;
        self.write_register(reg, field.insert(current, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{
        Mock,
        Transfer,
    };
    use regfile::{
        fixture::Builder,
        RegisterFile,
    };

    /// Hands back whatever data was written last, regardless of address
    #[derive(Debug, Default)]
    struct Echo {
        last: Vec<u8>,
    }

    impl Transport for Echo {
        fn transfer(
            &mut self,
            _addr: &[u8],
            data: Option<&[u8]>,
            read_len: usize,
        ) -> anyhow::Result<Vec<u8>> {
            if let Some(data) = data {
                self.last = data.to_vec();
                return Ok(vec![]);
            }
            Ok(self.last.iter().copied().take(read_len).collect())
        }
    }

    /// Always fails
    struct Broken;

    impl Transport for Broken {
        fn transfer(&mut self, _: &[u8], _: Option<&[u8]>, _: usize) -> anyhow::Result<Vec<u8>> {
            Err(anyhow!("i2c transfer failed"))
        }
    }

    #[test]
    fn test_echo_roundtrip() {
        for order in [
            ByteOrder::Big,
            ByteOrder::Little,
            ByteOrder::BigSwapped,
            ByteOrder::LittleSwapped,
        ] {
            let config = DeviceConfig::default().with_data(4, order);
            let mut dev = Device::new(Echo::default(), config).unwrap();
            if codec::is_supported(2, order) {
                dev.write(0x40, 2, 0xAABB).unwrap();
                assert_eq!(dev.read(0x40, 2).unwrap(), 0xAABB, "{order}");
            } else {
                assert!(matches!(
                    dev.write(0x40, 2, 0xAABB),
                    Err(Error::UnsupportedEncoding { width: 2, .. })
                ));
            }
            dev.write(0x40, 0, 0xDEAD_BEEF).unwrap();
            assert_eq!(dev.read(0x40, 0).unwrap(), 0xDEAD_BEEF, "{order}");
        }
    }

    #[test]
    fn test_default_width() {
        let config = DeviceConfig::default().with_data(2, ByteOrder::Big);
        let mut dev = Device::new(Mock::new(ByteOrder::Big).map(0x10, 8), config).unwrap();
        dev.read(0x10, 0).unwrap();
        dev.read(0x10, 4).unwrap();
        dev.read(0x10, 0).unwrap();
        let lens: Vec<_> = dev
            .transport()
            .history()
            .iter()
            .map(|t| t.read_len)
            .collect();
        assert_eq!(lens, [2, 4, 2]);
    }

    #[test]
    fn test_write_wire_format() {
        let config = DeviceConfig::default()
            .with_base_offset(0x100)
            .with_address(2, ByteOrder::Big)
            .with_data(4, ByteOrder::LittleSwapped);
        let mut dev = Device::new(Mock::new(ByteOrder::Big).map(0x120, 4), config).unwrap();
        dev.write(0x20, 0, 0x1122_3344).unwrap();
        assert_eq!(
            dev.transport().history(),
            [Transfer {
                addr: vec![0x01, 0x20],
                data: Some(vec![0x22, 0x11, 0x44, 0x33]),
                read_len: 0,
            }]
        );
        assert_eq!(dev.read(0x20, 0).unwrap(), 0x1122_3344);
        assert_eq!(dev.transport().history()[1].addr, [0x01, 0x20]);
    }

    #[test]
    fn test_address_encoding_independent_of_data() {
        let config = DeviceConfig::default()
            .with_address(4, ByteOrder::Little)
            .with_data(1, ByteOrder::Big);
        let mock = Mock::new(ByteOrder::Little).map(0x0001_0203, 8);
        let mut dev = Device::new(mock, config).unwrap();
        dev.write(0x0001_0203, 8, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(
            dev.transport().peek(0x0001_0203, 8).unwrap(),
            [1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(dev.read(0x0001_0203, 0).unwrap(), 0x01);
        assert_eq!(
            dev.transport().history().last().unwrap().addr,
            [0x03, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_typed_access() {
        let config = DeviceConfig::default().with_data(4, ByteOrder::Little);
        let mut dev = Device::new(Mock::new(ByteOrder::Big).map(0, 8), config).unwrap();
        dev.write_u64(0, 0x8877_6655_4433_2211).unwrap();
        assert_eq!(dev.read_u8(0).unwrap(), 0x11);
        assert_eq!(dev.read_u16(0).unwrap(), 0x2211);
        assert_eq!(dev.read_u32(4).unwrap(), 0x8877_6655);
        dev.write_u16(2, 0xBEEF).unwrap();
        assert_eq!(dev.read_u32(0).unwrap(), 0xBEEF_2211);
    }

    #[test]
    fn test_bad_config() {
        let config = DeviceConfig::default().with_address(3, ByteOrder::Big);
        assert!(matches!(
            Device::new(Echo::default(), config),
            Err(Error::UnsupportedEncoding { width: 3, .. })
        ));
        let config = DeviceConfig::default().with_data(2, ByteOrder::BigSwapped);
        assert!(matches!(
            Device::new(Echo::default(), config),
            Err(Error::UnsupportedEncoding { width: 2, .. })
        ));
    }

    #[test]
    fn test_bad_width() {
        let mut dev = Device::new(Echo::default(), DeviceConfig::default()).unwrap();
        assert!(matches!(
            dev.read(0, 3),
            Err(Error::UnsupportedEncoding { width: 3, .. })
        ));
        assert!(matches!(
            dev.write(0, 16, 0),
            Err(Error::UnsupportedEncoding { width: 16, .. })
        ));
        // Nothing reached the bus
        assert!(dev.transport().last.is_empty());
    }

    #[test]
    fn test_transport_failure() {
        let mut dev = Device::new(Broken, DeviceConfig::default().with_base_offset(0x10)).unwrap();
        let err = dev.read(0x20, 0).unwrap_err();
        match err {
            Error::Transport { addr, width, source } => {
                assert_eq!(addr, 0x30);
                assert_eq!(width, 4);
                assert_eq!(source.to_string(), "i2c transfer failed");
            }
            e => panic!("Unexpected error {e}"),
        }
        assert!(matches!(
            dev.write(0x20, 1, 0),
            Err(Error::Transport { width: 1, .. })
        ));
    }

    #[test]
    fn test_short_read() {
        // Echo only has two bytes to give back
        let mut dev = Device::new(Echo::default(), DeviceConfig::default()).unwrap();
        dev.write(0, 2, 0x1234).unwrap();
        assert!(matches!(
            dev.read(0, 4),
            Err(Error::Transport { width: 4, .. })
        ));
    }

    #[test]
    fn test_access_past_top_of_bus() {
        let config = DeviceConfig::default()
            .with_address(8, ByteOrder::Big)
            .with_data(2, ByteOrder::Big);
        let mut dev = Device::new(Mock::new(ByteOrder::Big).map(u64::MAX - 1, 2), config).unwrap();
        assert_eq!(dev.read(u64::MAX - 1, 2).unwrap(), 0);
        assert!(matches!(
            dev.read(u64::MAX, 2),
            Err(Error::Transport { addr: u64::MAX, width: 2, .. })
        ));
        assert!(matches!(
            dev.write(u64::MAX, 2, 0xBEEF),
            Err(Error::Transport { addr: u64::MAX, width: 2, .. })
        ));
    }

    fn sample() -> RegisterFile {
        RegisterFile::from_bytes(
            Builder::new("sensor")
                .block("cfg", 0x20, 0x20)
                .register("ctrl", 0x0, 2)
                .field("mode", 3, 0)
                .field("rate", 10, 8)
                .register("id", 0x4, 1)
                .register("odd", 0x8, 3)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_register_access() -> anyhow::Result<()> {
        let rf = sample();
        let config = DeviceConfig::default().with_data(4, ByteOrder::Big);
        let mut dev = Device::new(Mock::new(ByteOrder::Big).map(0x20, 0x10), config)?;
        let ctrl = rf.get_register("ctrl")?;
        dev.write_register(&ctrl, 0x0705)?;
        assert_eq!(dev.transport().peek(0x20, 2).unwrap(), [0x07, 0x05]);
        assert_eq!(dev.read_register(&ctrl)?, 0x0705);
        let id = rf.get_register_by_address(0x24)?;
        assert_eq!(dev.read_register(&id)?, 0);
        assert_eq!(dev.transport().history().last().unwrap().read_len, 1);
        Ok(())
    }

    #[test]
    fn test_field_access() -> anyhow::Result<()> {
        let rf = sample();
        let mut dev = Device::new(
            Mock::new(ByteOrder::Big).map(0x20, 0x10),
            DeviceConfig::default(),
        )?;
        let ctrl = rf.get_register("ctrl")?;
        let mode = ctrl.get_field("mode")?;
        let rate = ctrl.get_field_by_bits(10, 8)?;
        dev.write_register(&ctrl, 0xF0F0)?;
        dev.write_field(&ctrl, &mode, 0x5)?;
        assert_eq!(dev.read_register(&ctrl)?, 0xF0F5);
        dev.write_field(&ctrl, &rate, 0x2)?;
        assert_eq!(dev.read_register(&ctrl)?, 0xF2F5);
        assert_eq!(dev.read_field(&ctrl, &rate)?, 0x2);
        assert_eq!(dev.read_field(&ctrl, &mode)?, 0x5);
        Ok(())
    }

    #[test]
    fn test_register_with_unsupported_size() {
        let rf = sample();
        let mut dev = Device::new(Echo::default(), DeviceConfig::default()).unwrap();
        let odd = rf.get_register("odd").unwrap();
        assert!(matches!(
            dev.read_register(&odd),
            Err(Error::UnsupportedEncoding { width: 3, .. })
        ));
    }
}
