//! The parsing session: one source, its header and its section table.

use crate::header::{Elf64Header, ElfError};
use crate::section::{Elf64SectionHeader, SHT_STRTAB, parse_sections};
use crate::source::ByteSource;
use crate::strtab::StringTable;
use crate::symbol::{Elf64Symbol, extract_symbols};

/// A parsed ELF64 file.
///
/// Owns the byte source together with the file header and the full section
/// header table, both decoded once in [`ElfFile::parse`] and never modified.
/// Section contents (symbols, string tables) are read on demand.
#[derive(Debug)]
pub struct ElfFile<S> {
    source: S,
    header: Elf64Header,
    sections: Vec<Elf64SectionHeader>,
    shstrtab: Option<StringTable>,
}

impl<S: ByteSource> ElfFile<S> {
    /// Parse the file header and section header table of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if the header is invalid or the section header
    /// table cannot be read.
    pub fn parse(mut source: S) -> Result<Self, ElfError> {
        let header = Elf64Header::parse(&mut source)?;
        let sections = parse_sections(&mut source, &header)?;

        // Section names only feed diagnostics, so a broken `.shstrtab` is
        // tolerated.
        let shstrndx = usize::from(header.e_shstrndx);
        let shstrtab = sections
            .get(shstrndx)
            .filter(|s| shstrndx != 0 && s.sh_type == SHT_STRTAB)
            .and_then(|s| StringTable::load(&mut source, shstrndx, s).ok());

        Ok(Self {
            source,
            header,
            sections,
            shstrtab,
        })
    }

    /// Returns the parsed ELF64 file header.
    #[must_use]
    pub fn header(&self) -> &Elf64Header {
        &self.header
    }

    /// Returns every section header in table order.
    #[must_use]
    pub fn sections(&self) -> &[Elf64SectionHeader] {
        &self.sections
    }

    /// Returns the section header at the given 0-based index.
    #[must_use]
    pub fn section(&self, index: usize) -> Option<&Elf64SectionHeader> {
        self.sections.get(index)
    }

    /// Returns `(index, header)` pairs for every `SHT_SYMTAB` and
    /// `SHT_DYNSYM` section.
    pub fn symbol_tables(&self) -> impl Iterator<Item = (usize, &Elf64SectionHeader)> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_symbol_table())
    }

    /// Returns the name of section `index` from the section header string
    /// table, if the file has a usable one.
    #[must_use]
    pub fn section_name(&self, index: usize) -> Option<&str> {
        let section = self.sections.get(index)?;
        self.shstrtab.as_ref()?.get(section.sh_name)
    }

    /// Decode the symbols of section `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidLink`] if `index` is not a section, and any
    /// error from [`extract_symbols`].
    pub fn symbols(&mut self, index: usize) -> Result<Vec<Elf64Symbol>, ElfError> {
        let section = *self.section_or_link_error(index, index)?;
        extract_symbols(&mut self.source, index, &section)
    }

    /// Load the string table linked from section `index` through `sh_link`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::InvalidLink`] if `sh_link` does not name a
    /// section, and [`ElfError::SectionOutOfBounds`] if the linked table
    /// extends past the end of the file.
    pub fn linked_strtab(&mut self, index: usize) -> Result<StringTable, ElfError> {
        let link = self.section_or_link_error(index, index)?.sh_link;
        let link_index = usize::try_from(link).unwrap_or(usize::MAX);
        let strtab = *self.section_or_link_error(index, link_index)?;
        StringTable::load(&mut self.source, link_index, &strtab)
    }

    /// Returns section `target`, or an [`ElfError::InvalidLink`] blamed on
    /// section `from`.
    fn section_or_link_error(
        &self,
        from: usize,
        target: usize,
    ) -> Result<&Elf64SectionHeader, ElfError> {
        self.sections.get(target).ok_or(ElfError::InvalidLink {
            index: from,
            link: u32::try_from(target).unwrap_or(u32::MAX),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
