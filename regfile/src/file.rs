//! The owning side of a register file: a read-only mapping (or buffer) of the whole file
use crate::{
    data::{
        FileHeader,
        RegisterFileData,
        HEADER_SIZE,
    },
    error::{
        Error,
        Result,
    },
    views::{
        Register,
        RegisterBlock,
    },
};
use memmap2::Mmap;
use std::{
    fs::File,
    ops::Deref,
    path::Path,
};
use tracing::debug;

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mapped(m) => &m[..],
            Backing::Owned(v) => &v[..],
        }
    }
}

/// A validated register file held in memory for the lifetime of this value.
///
/// Files opened with [`RegisterFile::open`] are memory mapped read-only and unmapped on drop.
/// Lookups hand out views borrowing from `self`.
#[derive(Debug)]
pub struct RegisterFile {
    backing: Backing,
    header: FileHeader,
}

impl RegisterFile {
    /// Map the register file at `path`
    /// # Errors
    /// Returns errors on file IO errors or if the file's layout is invalid
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        // Mapping an empty file fails on some platforms, so catch short files here
        if len < HEADER_SIZE as u64 {
            return Err(Error::malformed(format!(
                "{} is only {len} bytes",
                path.display()
            )));
        }
        // Safety: the mapping is private and read-only. The file is not expected to be modified
        // while a session has it open.
        let map = unsafe { Mmap::map(&file)? };
        let rf = Self::from_backing(Backing::Mapped(map))?;
        debug!(
            path = %path.display(),
            blocks = rf.num_blocks(),
            regs = rf.num_regs(),
            fields = rf.num_fields(),
            "Mapped register file"
        );
        Ok(rf)
    }

    /// Use an in-memory copy of a register file
    /// # Errors
    /// Returns an error if the layout is invalid
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_backing(Backing::Owned(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self> {
        let header = RegisterFileData::new(&backing)?.header();
        Ok(Self { backing, header })
    }

    /// A borrowed view of the whole file
    #[must_use]
    pub fn data(&self) -> RegisterFileData<'_> {
        RegisterFileData::from_parts(&self.backing, self.header)
    }

    /// # Errors
    /// Returns an error if the name reference is malformed
    pub fn name(&self) -> Result<&str> {
        self.data().name()
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

    /// The register block at `index`
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `index >= num_blocks()`
    pub fn at(&self, index: u32) -> Result<RegisterBlock<'_>> {
        self.data().at(index)
    }

    /// Iterate over all register blocks in file order
    pub fn blocks(&self) -> impl Iterator<Item = Result<RegisterBlock<'_>>> + '_ {
        self.data().blocks()
    }

    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_register_block(&self, name: &str) -> Result<Option<RegisterBlock<'_>>> {
        self.data().find_block(name)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if no block is named `name`
    pub fn get_register_block(&self, name: &str) -> Result<RegisterBlock<'_>> {
        self.data().get_block(name)
    }

    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_register(&self, name: &str) -> Result<Option<Register<'_>>> {
        self.data().find_register(name)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if no register is named `name`
    pub fn get_register(&self, name: &str) -> Result<Register<'_>> {
        self.data().get_register(name)
    }

    /// # Errors
    /// Returns an error if the file is malformed
    pub fn find_register_by_address(&self, addr: u64) -> Result<Option<Register<'_>>> {
        self.data().find_register_by_address(addr)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if no register lives at `addr`
    pub fn get_register_by_address(&self, addr: u64) -> Result<Register<'_>> {
        self.data().get_register_by_address(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Kind,
        fixture::Builder,
    };
    use std::{
        io::Write,
        path::PathBuf,
    };

    fn sample() -> Vec<u8> {
        Builder::new("am5")
            .block("gpio1", 0x4ae1_0000, 0x200)
            .register("revision", 0x0, 4)
            .field("minor", 5, 0)
            .field("major", 10, 8)
            .register("dataout", 0x13c, 4)
            .build()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("regfile-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_open_mapped() -> anyhow::Result<()> {
        let path = temp_path("open.bin");
        std::fs::File::create(&path)?.write_all(&sample())?;
        let rf = RegisterFile::open(&path)?;
        assert_eq!(rf.name()?, "am5");
        assert_eq!(rf.num_blocks(), 1);
        assert_eq!(rf.num_regs(), 2);
        assert_eq!(rf.num_fields(), 2);
        let reg = rf.get_register_by_address(0x4ae1_013c)?;
        assert_eq!(reg.name()?, "dataout");
        let major = rf.get_register("revision")?.get_field("major")?;
        assert_eq!((major.high(), major.low()), (10, 8));
        drop(rf);
        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_open_missing() {
        let path = temp_path("does-not-exist.bin");
        assert!(matches!(RegisterFile::open(path), Err(Error::Io(_))));
    }

    #[test]
    fn test_open_short() -> anyhow::Result<()> {
        let path = temp_path("short.bin");
        std::fs::File::create(&path)?.write_all(&[0; 4])?;
        let result = RegisterFile::open(&path);
        std::fs::remove_file(&path)?;
        assert!(matches!(result, Err(Error::Malformed(_))));
        Ok(())
    }

    #[test]
    fn test_from_bytes() -> anyhow::Result<()> {
        let rf = RegisterFile::from_bytes(sample())?;
        assert_eq!(rf.at(0)?.name()?, "gpio1");
        assert!(rf.find_register_block("gpio2")?.is_none());
        assert!(matches!(
            rf.get_register_block("gpio2"),
            Err(Error::NotFound {
                kind: Kind::Block,
                ..
            })
        ));
        assert!(rf.find_register("dataout")?.is_some());
        assert!(rf.find_register_by_address(0x4ae1_0004)?.is_none());
        assert_eq!(rf.blocks().count(), 1);
        Ok(())
    }

    #[test]
    fn test_from_bytes_malformed() {
        let mut bytes = sample();
        bytes.truncate(HEADER_SIZE + 10);
        assert!(matches!(
            RegisterFile::from_bytes(bytes),
            Err(Error::Malformed(_))
        ));
    }
}
