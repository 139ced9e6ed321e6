//! String table (`SHT_STRTAB`) loading and lookup.

use std::borrow::Cow;

use crate::header::ElfError;
use crate::section::Elf64SectionHeader;
use crate::source::ByteSource;

/// The raw bytes of a string table section.
///
/// By ELF convention offset 0 holds the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    data: Vec<u8>,
}

impl StringTable {
    /// Wraps raw section bytes.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Read the contents of string-table `section` (section index `index`).
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::SectionOutOfBounds`] if the section extends past
    /// the end of the file.
    pub fn load<S: ByteSource + ?Sized>(
        source: &mut S,
        index: usize,
        section: &Elf64SectionHeader,
    ) -> Result<Self, ElfError> {
        section.read_data(source, index).map(Self::new)
    }

    /// Size of the table in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the table holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw bytes from `offset` up to (not including) the next NUL, or to the
    /// end of the table if the string is unterminated.
    fn bytes_at(&self, offset: u32) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        let remaining = self.data.get(start..).filter(|r| !r.is_empty())?;
        let end = remaining.iter().position(|&b| b == 0).unwrap_or(remaining.len());
        Some(&remaining[..end])
    }

    /// Looks up the string starting at byte `offset`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, so every in-bounds
    /// offset resolves to some name.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::NameOutOfBounds`] if `offset` is not inside the
    /// table.
    pub fn lookup(&self, offset: u32) -> Result<Cow<'_, str>, ElfError> {
        self.bytes_at(offset)
            .map(String::from_utf8_lossy)
            .ok_or(ElfError::NameOutOfBounds {
                offset,
                len: self.data.len(),
            })
    }

    /// Looks up a NUL-terminated string at the given byte offset.
    ///
    /// Returns `None` if the offset is out of bounds, the string is not
    /// terminated, or it contains invalid UTF-8.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&str> {
        let start = usize::try_from(offset).ok()?;
        let remaining = self.data.get(start..)?;
        let nul_pos = remaining.iter().position(|&b| b == 0)?;
        core::str::from_utf8(&remaining[..nul_pos]).ok()
    }
}
