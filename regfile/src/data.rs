//! The in-place layout of a register file.
//!
//! A register file is one contiguous, relocatable byte region. It starts with a [`FileHeader`],
//! followed back to back by the block, register and field record arrays and finally the string
//! table. No absolute pointers are stored: every array boundary is computed from the counts in
//! the header, every child range is an (offset, count) pair into the next array down, and every
//! name is a byte offset into the string table.
//!
//! ```text
//! [Header: name:u32 num_blocks:u32 num_regs:u32 num_fields:u32]
//! [Block[num_blocks]: name:u32 offset:u64 size:u64 regs_offset:u32 num_regs:u32]
//! [Register[num_regs]: name:u32 offset:u64 size:u32 fields_offset:u32 num_fields:u32]
//! [Field[num_fields]: name:u32 high:u8 low:u8]
//! [Strings: NUL terminated]
//! ```
//!
//! All records are packed and little endian.
use crate::{
    error::{
        Error,
        Kind,
        Result,
    },
    views::{
        Register,
        RegisterBlock,
    },
};
use kstring::KString;
use nom::{
    bytes::complete::{
        tag,
        take_till,
    },
    combinator::map_res,
    number::complete::{
        le_u32,
        le_u64,
        u8 as byte,
    },
    sequence::{
        terminated,
        tuple,
    },
    IResult,
};
use std::str::from_utf8;
use tracing::trace;

/// The header at offset 0 of every register file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// String table offset of the file's name
    pub name: u32,
    pub num_blocks: u32,
    /// Total number of registers across all blocks
    pub num_regs: u32,
    /// Total number of fields across all registers
    pub num_fields: u32,
}

/// A register block record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub name: u32,
    /// Bus address of the start of the block
    pub offset: u64,
    /// Size in bytes of the block's address range
    pub size: u64,
    /// Index of the block's first register in the register array
    pub regs_offset: u32,
    pub num_regs: u32,
}

/// A register record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterData {
    pub name: u32,
    /// Offset relative to the owning block's offset
    pub offset: u64,
    /// Natural access width in bytes
    pub size: u32,
    /// Index of the register's first field in the field array
    pub fields_offset: u32,
    pub num_fields: u32,
}

/// A field record, covering bits `high..=low` of its register
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldData {
    pub name: u32,
    pub high: u8,
    pub low: u8,
}

/// Fixed-size records stored in one of the register file arrays
pub(crate) trait Record: Sized {
    /// Packed size in bytes
    const SIZE: usize;
    /// The hierarchy level this record describes
    const KIND: Kind;

    fn parse(input: &[u8]) -> IResult<&[u8], Self>;
}

pub const HEADER_SIZE: usize = 16;

fn file_header(input: &[u8]) -> IResult<&[u8], FileHeader> {
    let (remaining, (name, num_blocks, num_regs, num_fields)) =
        tuple((le_u32, le_u32, le_u32, le_u32))(input)?;
    Ok((
        remaining,
        FileHeader {
            name,
            num_blocks,
            num_regs,
            num_fields,
        },
    ))
}

impl Record for BlockData {
    const SIZE: usize = 28;
    const KIND: Kind = Kind::Block;

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (remaining, (name, offset, size, regs_offset, num_regs)) =
            tuple((le_u32, le_u64, le_u64, le_u32, le_u32))(input)?;
        Ok((
            remaining,
            Self {
                name,
                offset,
                size,
                regs_offset,
                num_regs,
            },
        ))
    }
}

impl Record for RegisterData {
    const SIZE: usize = 24;
    const KIND: Kind = Kind::Register;

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (remaining, (name, offset, size, fields_offset, num_fields)) =
            tuple((le_u32, le_u64, le_u32, le_u32, le_u32))(input)?;
        Ok((
            remaining,
            Self {
                name,
                offset,
                size,
                fields_offset,
                num_fields,
            },
        ))
    }
}

impl Record for FieldData {
    const SIZE: usize = 6;
    const KIND: Kind = Kind::Field;

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (remaining, (name, high, low)) = tuple((le_u32, byte, byte))(input)?;
        Ok((remaining, Self { name, high, low }))
    }
}

fn c_string(input: &[u8]) -> IResult<&[u8], &str> {
    map_res(terminated(take_till(|b: u8| b == 0), tag("\0")), from_utf8)(input)
}

/// A borrowed view of a whole register file.
///
/// This is a (bytes, header) pair and is cheap to copy. Every accessor computes its record's
/// location from the header counts and bounds checks it against the byte region before decoding,
/// so a corrupt file produces [`Error::Malformed`] instead of garbage.
#[derive(Debug, Copy, Clone)]
pub struct RegisterFileData<'a> {
    bytes: &'a [u8],
    header: FileHeader,
}

impl<'a> RegisterFileData<'a> {
    /// Interpret `bytes` as a register file
    /// # Errors
    /// Returns [`Error::Malformed`] if the header or the record arrays don't fit in `bytes`
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let (_, header) = file_header(bytes).map_err(|_| {
            Error::malformed(format!(
                "{} bytes is too short for a {HEADER_SIZE} byte header",
                bytes.len()
            ))
        })?;
        let rfd = Self { bytes, header };
        let strings = rfd.strings_start();
        if strings > bytes.len() as u64 {
            return Err(Error::malformed(format!(
                "header describes {}/{}/{} blocks/registers/fields needing {strings} bytes, but \
                 the file is only {} bytes",
                header.num_blocks,
                header.num_regs,
                header.num_fields,
                bytes.len()
            )));
        }
        Ok(rfd)
    }

    /// Rebuild a view from a header that was already validated against `bytes`
    pub(crate) fn from_parts(bytes: &'a [u8], header: FileHeader) -> Self {
        Self { bytes, header }
    }

    #[must_use]
    pub fn header(&self) -> FileHeader {
        self.header
    }

    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The name of the register file
    /// # Errors
    /// Returns an error if the name reference is out of bounds
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.header.name)
    }

    #[must_use]
    pub fn num_blocks(&self) -> u32 {
        self.header.num_blocks
    }

    #[must_use]
    pub fn num_regs(&self) -> u32 {
        self.header.num_regs
    }

    #[must_use]
    pub fn num_fields(&self) -> u32 {
        self.header.num_fields
    }

    // Array boundaries are running sums of the counts before them. These are computed in u64 so
    // a hostile header can't overflow them.

    fn blocks_start(&self) -> u64 {
        HEADER_SIZE as u64
    }

    fn registers_start(&self) -> u64 {
        self.blocks_start() + u64::from(self.header.num_blocks) * BlockData::SIZE as u64
    }

    fn fields_start(&self) -> u64 {
        self.registers_start() + u64::from(self.header.num_regs) * RegisterData::SIZE as u64
    }

    fn strings_start(&self) -> u64 {
        self.fields_start() + u64::from(self.header.num_fields) * FieldData::SIZE as u64
    }

    fn record<R: Record>(&self, start: u64, count: u32, index: u32) -> Result<R> {
        if index >= count {
            return Err(Error::OutOfRange {
                kind: R::KIND,
                index,
                count,
            });
        }
        let offset = start + u64::from(index) * R::SIZE as u64;
        let bytes = usize::try_from(offset)
            .ok()
            .and_then(|o| self.bytes.get(o..o.checked_add(R::SIZE)?))
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} record {index} at {offset:#x} lies outside the file",
                    R::KIND
                ))
            })?;
        let (_, record) = R::parse(bytes).map_err(|_| {
            Error::malformed(format!("truncated {} record {index}", R::KIND))
        })?;
        Ok(record)
    }

    /// Decode the block record at `index` in the block array
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_blocks()`
    pub fn block(&self, index: u32) -> Result<BlockData> {
        self.record(self.blocks_start(), self.header.num_blocks, index)
    }

    /// Decode the register record at `index` in the global register array
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_regs()`
    pub fn register(&self, index: u32) -> Result<RegisterData> {
        self.record(self.registers_start(), self.header.num_regs, index)
    }

    /// Decode the field record at `index` in the global field array
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_fields()`
    pub fn field(&self, index: u32) -> Result<FieldData> {
        self.record(self.fields_start(), self.header.num_fields, index)
    }

    /// Resolve a name reference into the string table
    /// # Errors
    /// Returns [`Error::Malformed`] if the reference points outside the file, or the string is
    /// unterminated or not UTF-8
    pub fn string(&self, name: u32) -> Result<&'a str> {
        let start = self.strings_start() + u64::from(name);
        let tail = usize::try_from(start)
            .ok()
            .and_then(|s| self.bytes.get(s..))
            .ok_or_else(|| {
                Error::malformed(format!("string reference {name:#x} lies outside the file"))
            })?;
        let (_, s) = c_string(tail).map_err(|_| {
            Error::malformed(format!(
                "string at {name:#x} is not a NUL terminated UTF-8 string"
            ))
        })?;
        Ok(s)
    }

    /// Map the `index`th child of a parent record into the global array one level down.
    ///
    /// `offset` and `count` are the parent's child range, `total` is the length of the child
    /// array.
    pub(crate) fn child_index(
        kind: Kind,
        offset: u32,
        count: u32,
        total: u32,
        index: u32,
    ) -> Result<u32> {
        if index >= count {
            return Err(Error::OutOfRange { kind, index, count });
        }
        offset
            .checked_add(index)
            .filter(|global| *global < total)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{kind} range {offset}+{count} exceeds the {total} {kind} records in the file"
                ))
            })
    }

    /// The register block at `index`
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_blocks()`
    pub fn at(&self, index: u32) -> Result<RegisterBlock<'a>> {
        RegisterBlock::new(*self, index)
    }

    /// Iterate over all register blocks in file order
    pub fn blocks(&self) -> impl Iterator<Item = Result<RegisterBlock<'a>>> + 'a {
        let rfd = *self;
        (0..rfd.num_blocks()).map(move |i| rfd.at(i))
    }

    /// Find the first register block named exactly `name`
    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_block(&self, name: &str) -> Result<Option<RegisterBlock<'a>>> {
        trace!(name, "Looking up register block");
        for block in self.blocks() {
            let block = block?;
            if block.name()? == name {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    /// Find a register block by name
    /// # Errors
    /// Returns [`Error::NotFound`] if no block is named `name`
    pub fn get_block(&self, name: &str) -> Result<RegisterBlock<'a>> {
        self.find_block(name)?
            .ok_or_else(|| Error::not_found(Kind::Block, KString::from_ref(name)))
    }

    /// Find the first register named exactly `name`, searching blocks in file order and the
    /// registers of each block in order
    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_register(&self, name: &str) -> Result<Option<Register<'a>>> {
        trace!(name, "Looking up register");
        for block in self.blocks() {
            if let Some(reg) = block?.find_register(name)? {
                return Ok(Some(reg));
            }
        }
        Ok(None)
    }

    /// Find a register by name
    /// # Errors
    /// Returns [`Error::NotFound`] if no register is named `name`
    pub fn get_register(&self, name: &str) -> Result<Register<'a>> {
        self.find_register(name)?
            .ok_or_else(|| Error::not_found(Kind::Register, KString::from_ref(name)))
    }

    /// Find the register whose bus address (block offset + register offset) is `addr`.
    ///
    /// Only blocks whose address range contains `addr` are searched. The first match in file
    /// order wins.
    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_register_by_address(&self, addr: u64) -> Result<Option<Register<'a>>> {
        trace!(addr, "Looking up register by address");
        for block in self.blocks() {
            let block = block?;
            if !block.contains(addr) {
                continue;
            }
            let rel = addr - block.offset();
            for reg in block.registers() {
                let reg = reg?;
                if reg.offset() == rel {
                    return Ok(Some(reg));
                }
            }
        }
        Ok(None)
    }

    /// Find a register by bus address
    /// # Errors
    /// Returns [`Error::NotFound`] if no register lives at `addr`
    pub fn get_register_by_address(&self, addr: u64) -> Result<Register<'a>> {
        self.find_register_by_address(addr)?
            .ok_or_else(|| Error::not_found(Kind::Register, format!("{addr:#x}")))
    }
}
