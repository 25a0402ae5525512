//! Defines the transport mechanism devices are accessed through

pub mod mock;

/// The trait that is implemented for bus transports.
///
/// A transport performs one bus transaction per call and knows nothing about widths or byte
/// orders. It is handed raw address bytes and either raw data bytes to write or a number of bytes
/// to read back. The methods of this trait *assume* that the bus device is already open.
pub trait Transport {
    /// Perform a single transaction: send `addr`, then either send `data` in the same message or,
    /// if `data` is `None`, read back `read_len` bytes.
    ///
    /// For writes the returned vector is empty. For reads it should be exactly `read_len` bytes.
    /// # Errors
    /// Returns an error if the transaction fails on the bus
    fn transfer(
        &mut self,
        addr: &[u8],
        data: Option<&[u8]>,
        read_len: usize,
    ) -> anyhow::Result<Vec<u8>>;
}

impl<T> Transport for &mut T
where
    T: Transport + ?Sized,
{
    fn transfer(
        &mut self,
        addr: &[u8],
        data: Option<&[u8]>,
        read_len: usize,
    ) -> anyhow::Result<Vec<u8>> {
        (**self).transfer(addr, data, read_len)
    }
}

impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    fn transfer(
        &mut self,
        addr: &[u8],
        data: Option<&[u8]>,
        read_len: usize,
    ) -> anyhow::Result<Vec<u8>> {
        (**self).transfer(addr, data, read_len)
    }
}
