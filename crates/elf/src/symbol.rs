//! ELF64 symbol table parsing.

use crate::header::{ElfError, LeCursor};
use crate::section::Elf64SectionHeader;
use crate::source::ByteSource;

/// Symbol type: data object.
pub const STT_OBJECT: u8 = 1;

/// Symbol type: function.
pub const STT_FUNC: u8 = 2;

/// Symbol binding: global.
pub const STB_GLOBAL: u8 = 1;

/// Symbol binding: weak.
pub const STB_WEAK: u8 = 2;

/// Special section index: undefined.
pub const SHN_UNDEF: u16 = 0;

/// Size of an ELF64 symbol entry (24 bytes).
pub const ELF64_SYM_SIZE: usize = 24;

/// Parsed ELF64 symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Symbol {
    /// Offset into the associated string table for this symbol's name
    /// (0 means the symbol has no name).
    pub st_name: u32,
    /// Symbol type and binding packed into one byte.
    pub st_info: u8,
    /// Symbol visibility.
    pub st_other: u8,
    /// Section index this symbol is defined in.
    pub st_shndx: u16,
    /// Symbol value (address for defined symbols).
    pub st_value: u64,
    /// Symbol size in bytes.
    pub st_size: u64,
}

impl Elf64Symbol {
    /// Decode a symbol entry from the first 24 bytes of `bytes`.
    fn decode(bytes: &[u8]) -> Option<Self> {
        let mut c = LeCursor::new(bytes);
        Some(Self {
            st_name: c.u32()?,
            st_info: c.u8()?,
            st_other: c.u8()?,
            st_shndx: c.u16()?,
            st_value: c.u64()?,
            st_size: c.u64()?,
        })
    }

    /// Returns the symbol type (lower 4 bits of `st_info`).
    #[must_use]
    pub fn sym_type(&self) -> u8 {
        self.st_info & 0xf
    }

    /// Returns the symbol binding (upper 4 bits of `st_info`).
    #[must_use]
    pub fn sym_bind(&self) -> u8 {
        self.st_info >> 4
    }

    /// Returns `true` if the symbol is not defined in this file.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        self.st_shndx == SHN_UNDEF
    }
}

/// Decode every record of the symbol table `section` (section index `index`).
///
/// An empty section yields an empty vector without reading. Records are
/// returned in symbol-table index order, including the null symbol at index 0.
///
/// # Errors
///
/// Returns [`ElfError::MalformedSection`] if the section is not a symbol table
/// or its `sh_entsize` cannot hold a symbol record, and
/// [`ElfError::SectionOutOfBounds`] if its contents extend past the file.
pub fn extract_symbols<S: ByteSource + ?Sized>(
    source: &mut S,
    index: usize,
    section: &Elf64SectionHeader,
) -> Result<Vec<Elf64Symbol>, ElfError> {
    if !section.is_symbol_table() {
        return Err(ElfError::MalformedSection {
            index,
            reason: "not a symbol table",
        });
    }
    if section.sh_size == 0 {
        return Ok(Vec::new());
    }

    let count = section.entry_count(index)?;
    let entsize = usize::try_from(section.sh_entsize).unwrap_or(usize::MAX);
    if entsize < ELF64_SYM_SIZE {
        return Err(ElfError::MalformedSection {
            index,
            reason: "entry size is smaller than a symbol record",
        });
    }

    let data = section.read_data(source, index)?;
    let symbols = data
        .chunks_exact(entsize)
        .map(Elf64Symbol::decode)
        .collect::<Option<Vec<_>>>()
        .ok_or(ElfError::MalformedSection {
            index,
            reason: "symbol record truncated",
        })?;
    debug_assert_eq!(symbols.len() as u64, count);
    Ok(symbols)
}
