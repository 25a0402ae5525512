//! Mock transport implementations used in testing the interface

use super::Transport;
use crate::codec::{
    self,
    ByteOrder,
};
use anyhow::{
    anyhow,
    bail,
};
use std::collections::HashMap;

/// One recorded call to [`Transport::transfer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub addr: Vec<u8>,
    pub data: Option<Vec<u8>>,
    pub read_len: usize,
}

/// A bus device that mocks reads and writes against sparse memory, useful for testing.
///
/// The address phase is decoded with the configured byte order. Only bytes inside regions added
/// with [`Mock::map`] exist; touching anything else fails the transaction.
#[derive(Debug)]
pub struct Mock {
    memory: HashMap<u64, u8>,
    address_order: ByteOrder,
    history: Vec<Transfer>,
}

impl Mock {
    /// Construct a new mock device with nothing mapped
    #[must_use]
    pub fn new(address_order: ByteOrder) -> Self {
        Self {
            memory: HashMap::default(),
            address_order,
            history: vec![],
        }
    }

    /// Add a zeroed region of `length` bytes at `addr`, clipped to the top of the address space.
    /// Bytes that are already mapped keep their contents.
    #[must_use]
    pub fn map(mut self, addr: u64, length: u64) -> Self {
        // Only touched addresses get an entry
        for a in (0..length).map_while(|i| addr.checked_add(i)) {
            self.memory.entry(a).or_insert(0);
        }
        self
    }

    /// The raw bytes at `addr`, if they are all mapped
    #[must_use]
    pub fn peek(&self, addr: u64, n: usize) -> Option<Vec<u8>> {
        (0..n as u64)
            .map(|i| addr.checked_add(i).and_then(|a| self.memory.get(&a).copied()))
            .collect()
    }

    /// Every transaction performed so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[Transfer] {
        &self.history
    }
}

impl Transport for Mock {
    fn transfer(
        &mut self,
        addr: &[u8],
        data: Option<&[u8]>,
        read_len: usize,
    ) -> anyhow::Result<Vec<u8>> {
        self.history.push(Transfer {
            addr: addr.to_vec(),
            data: data.map(<[u8]>::to_vec),
            read_len,
        });
        if !codec::is_supported(addr.len(), self.address_order) {
            bail!("Can't decode a {} byte address", addr.len());
        }
        let base = codec::decode(addr, self.address_order);
        if let Some(data) = data {
            for (i, byte) in data.iter().enumerate() {
                let a = base.checked_add(i as u64).ok_or_else(|| {
                    anyhow!("Out of bounds write of {} bytes at {base:#x}", data.len())
                })?;
                let slot = self
                    .memory
                    .get_mut(&a)
                    .ok_or_else(|| anyhow!("Attempting to write to a nonexistent address {a:#x}"))?;
                *slot = *byte;
            }
            return Ok(vec![]);
        }
        self.peek(base, read_len)
            .ok_or_else(|| anyhow!("Out of bounds read of {read_len} bytes at {base:#x}"))
    }
}
