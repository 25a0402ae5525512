//! Copyable read-only handles onto the register hierarchy.
//!
//! Each view is a [`RegisterFileData`] plus the index of one record and a decoded copy of that
//! record. They own nothing and are only valid as long as the underlying bytes are borrowed.
use crate::{
    data::{
        BlockData,
        FieldData,
        RegisterData,
        RegisterFileData,
    },
    error::{
        Error,
        Kind,
        Result,
    },
};
use kstring::KString;

/// A named group of registers sharing a base bus address
#[derive(Debug, Copy, Clone)]
pub struct RegisterBlock<'a> {
    rfd: RegisterFileData<'a>,
    index: u32,
    data: BlockData,
}

impl<'a> RegisterBlock<'a> {
    pub(crate) fn new(rfd: RegisterFileData<'a>, index: u32) -> Result<Self> {
        let data = rfd.block(index)?;
        Ok(Self { rfd, index, data })
    }

    /// Index of this block in the register file
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// # Errors
    /// Returns an error if the name reference is malformed
    pub fn name(&self) -> Result<&'a str> {
        self.rfd.string(self.data.name)
    }

    /// Bus address of the block
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.data.offset
    }

    /// Size in bytes of the block's address range
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.size
    }

    #[must_use]
    pub fn num_regs(&self) -> u32 {
        self.data.num_regs
    }

    /// Whether `addr` falls in `[offset, offset + size)`
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.data.offset && addr - self.data.offset < self.data.size
    }

    /// The `index`th register of this block
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_regs()`, or [`Error::Malformed`] if the
    /// block's register range runs off the end of the register array
    pub fn at(&self, index: u32) -> Result<Register<'a>> {
        let global = RegisterFileData::child_index(
            Kind::Register,
            self.data.regs_offset,
            self.data.num_regs,
            self.rfd.num_regs(),
            index,
        )?;
        Register::new(*self, global)
    }

    /// Iterate over this block's registers in order
    pub fn registers(&self) -> impl Iterator<Item = Result<Register<'a>>> + 'a {
        let block = *self;
        (0..block.num_regs()).map(move |i| block.at(i))
    }

    /// Find the first register in this block named exactly `name`
    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_register(&self, name: &str) -> Result<Option<Register<'a>>> {
        for reg in self.registers() {
            let reg = reg?;
            if reg.name()? == name {
                return Ok(Some(reg));
            }
        }
        Ok(None)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if this block has no register named `name`
    pub fn get_register(&self, name: &str) -> Result<Register<'a>> {
        self.find_register(name)?
            .ok_or_else(|| Error::not_found(Kind::Register, KString::from_ref(name)))
    }
}

/// A named, fixed-width register within a block
#[derive(Debug, Copy, Clone)]
pub struct Register<'a> {
    block: RegisterBlock<'a>,
    index: u32,
    data: RegisterData,
}

impl<'a> Register<'a> {
    fn new(block: RegisterBlock<'a>, index: u32) -> Result<Self> {
        let data = block.rfd.register(index)?;
        Ok(Self { block, index, data })
    }

    /// Index of this register in the file-wide register array
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// # Errors
    /// Returns an error if the name reference is malformed
    pub fn name(&self) -> Result<&'a str> {
        self.block.rfd.string(self.data.name)
    }

    /// The block this register belongs to
    #[must_use]
    pub fn block(&self) -> RegisterBlock<'a> {
        self.block
    }

    /// Offset relative to the owning block
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.data.offset
    }

    /// Absolute bus address, the block offset plus the register offset
    #[must_use]
    pub fn address(&self) -> u64 {
        self.block.offset().wrapping_add(self.data.offset)
    }

    /// Natural access width in bytes
    #[must_use]
    pub fn size(&self) -> u32 {
        self.data.size
    }

    #[must_use]
    pub fn num_fields(&self) -> u32 {
        self.data.num_fields
    }

    /// The `index`th field of this register
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_fields()`, or [`Error::Malformed`] if the
    /// field range or the field's bits are invalid
    pub fn at(&self, index: u32) -> Result<Field<'a>> {
        let global = RegisterFileData::child_index(
            Kind::Field,
            self.data.fields_offset,
            self.data.num_fields,
            self.block.rfd.num_fields(),
            index,
        )?;
        Field::new(self.block.rfd, global)
    }

    /// Iterate over this register's fields in order
    pub fn fields(&self) -> impl Iterator<Item = Result<Field<'a>>> + 'a {
        let reg = *self;
        (0..reg.num_fields()).map(move |i| reg.at(i))
    }

    /// Find the first field named exactly `name`
    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_field(&self, name: &str) -> Result<Option<Field<'a>>> {
        for field in self.fields() {
            let field = field?;
            if field.name()? == name {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if this register has no field named `name`
    pub fn get_field(&self, name: &str) -> Result<Field<'a>> {
        self.find_field(name)?
            .ok_or_else(|| Error::not_found(Kind::Field, KString::from_ref(name)))
    }

    /// Get the first field covering exactly bits `high..=low`
    /// # Errors
    /// Returns [`Error::NotFound`] if no field has that exact bit range
    pub fn get_field_by_bits(&self, high: u8, low: u8) -> Result<Field<'a>> {
        for field in self.fields() {
            let field = field?;
            if field.high() == high && field.low() == low {
                return Ok(field);
            }
        }
        Err(Error::not_found(Kind::Field, format!("{high}:{low}")))
    }
}

/// An inclusive bit range `high..=low` of a register's value
#[derive(Debug, Copy, Clone)]
pub struct Field<'a> {
    rfd: RegisterFileData<'a>,
    index: u32,
    data: FieldData,
}

impl<'a> Field<'a> {
    fn new(rfd: RegisterFileData<'a>, index: u32) -> Result<Self> {
        let data = rfd.field(index)?;
        if data.high >= 64 || data.low > data.high {
            return Err(Error::malformed(format!(
                "field {index} has invalid bit range {}:{}",
                data.high, data.low
            )));
        }
        Ok(Self { rfd, index, data })
    }

    /// Index of this field in the file-wide field array
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// # Errors
    /// Returns an error if the name reference is malformed
    pub fn name(&self) -> Result<&'a str> {
        self.rfd.string(self.data.name)
    }

    #[must_use]
    pub fn high(&self) -> u8 {
        self.data.high
    }

    #[must_use]
    pub fn low(&self) -> u8 {
        self.data.low
    }

    /// Number of bits covered
    #[must_use]
    pub fn width(&self) -> u32 {
        u32::from(self.data.high - self.data.low) + 1
    }

    /// The bits of a register value covered by this field
    #[must_use]
    pub fn mask(&self) -> u64 {
        (u64::MAX >> (63 - (self.data.high - self.data.low))) << self.data.low
    }

    /// Pull this field's value out of a whole register value
    #[must_use]
    pub fn extract(&self, reg_value: u64) -> u64 {
        (reg_value & self.mask()) >> self.data.low
    }

    /// Replace this field's bits in `reg_value` with `value`. Bits of `value` that don't fit in
    /// the field are dropped.
    #[must_use]
    pub fn insert(&self, reg_value: u64, value: u64) -> u64 {
        (reg_value & !self.mask()) | ((value << self.data.low) & self.mask())
    }
}
