//! An in-memory register file builder for tests.
//!
//! This only covers what tests need: it lays out whatever it is given, in order, and doesn't
//! validate anything.

use crate::data::HEADER_SIZE;

#[derive(Debug)]
struct PendingBlock {
    name: String,
    offset: u64,
    size: u64,
    regs: Vec<PendingRegister>,
}

#[derive(Debug)]
struct PendingRegister {
    name: String,
    offset: u64,
    size: u32,
    fields: Vec<(String, u8, u8)>,
}

/// Builds register file bytes block by block.
///
/// [`register`](Builder::register) adds to the most recent block and
/// [`field`](Builder::field) to the most recent register.
#[derive(Debug)]
pub struct Builder {
    name: String,
    blocks: Vec<PendingBlock>,
}

impl Builder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            blocks: vec![],
        }
    }

    #[must_use]
    pub fn block(mut self, name: &str, offset: u64, size: u64) -> Self {
        self.blocks.push(PendingBlock {
            name: name.to_owned(),
            offset,
            size,
            regs: vec![],
        });
        self
    }

    /// # Panics
    /// Panics if no block has been added yet
    #[must_use]
    pub fn register(mut self, name: &str, offset: u64, size: u32) -> Self {
        self.blocks
            .last_mut()
            .expect("register added before any block")
            .regs
            .push(PendingRegister {
                name: name.to_owned(),
                offset,
                size,
                fields: vec![],
            });
        self
    }

    /// # Panics
    /// Panics if no register has been added yet
    #[must_use]
    pub fn field(mut self, name: &str, high: u8, low: u8) -> Self {
        self.blocks
            .last_mut()
            .and_then(|b| b.regs.last_mut())
            .expect("field added before any register")
            .fields
            .push((name.to_owned(), high, low));
        self
    }

    /// Lay out the header, the three record arrays and the string table
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(&self) -> Vec<u8> {
        let mut strings: Vec<u8> = vec![];
        let mut intern = |s: &str| {
            let offset = strings.len() as u32;
            strings.extend_from_slice(s.as_bytes());
            strings.push(0);
            offset
        };

        let regs = self.blocks.iter().flat_map(|b| &b.regs);
        let num_regs = regs.clone().count() as u32;
        let num_fields = regs.clone().map(|r| r.fields.len()).sum::<usize>() as u32;

        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(&intern(&self.name).to_le_bytes());
        header.extend_from_slice(&(self.blocks.len() as u32).to_le_bytes());
        header.extend_from_slice(&num_regs.to_le_bytes());
        header.extend_from_slice(&num_fields.to_le_bytes());

        let mut blocks = vec![];
        let mut registers = vec![];
        let mut fields = vec![];
        let mut regs_offset = 0u32;
        let mut fields_offset = 0u32;
        for block in &self.blocks {
            blocks.extend_from_slice(&intern(&block.name).to_le_bytes());
            blocks.extend_from_slice(&block.offset.to_le_bytes());
            blocks.extend_from_slice(&block.size.to_le_bytes());
            blocks.extend_from_slice(&regs_offset.to_le_bytes());
            blocks.extend_from_slice(&(block.regs.len() as u32).to_le_bytes());
            regs_offset += block.regs.len() as u32;
            for reg in &block.regs {
                registers.extend_from_slice(&intern(&reg.name).to_le_bytes());
                registers.extend_from_slice(&reg.offset.to_le_bytes());
                registers.extend_from_slice(&reg.size.to_le_bytes());
                registers.extend_from_slice(&fields_offset.to_le_bytes());
                registers.extend_from_slice(&(reg.fields.len() as u32).to_le_bytes());
                fields_offset += reg.fields.len() as u32;
                for (name, high, low) in &reg.fields {
                    fields.extend_from_slice(&intern(name).to_le_bytes());
                    fields.push(*high);
                    fields.push(*low);
                }
            }
        }

        [header, blocks, registers, fields, strings].concat()
    }
}
