//! ELF64 section header table parsing.
//!
//! The section header table is read once, right after the file header, and
//! decoded into an ordered vector. A descriptor's position in that vector is
//! its section index, which `sh_link` and `st_shndx` refer to.

use crate::header::{Elf64Header, ElfError, LeCursor};
use crate::source::ByteSource;

/// Section type: inactive entry.
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined contents.
pub const SHT_PROGBITS: u32 = 1;

/// Section type: symbol table.
pub const SHT_SYMTAB: u32 = 2;

/// Section type: string table.
pub const SHT_STRTAB: u32 = 3;

/// Section type: occupies no space in the file (`.bss`).
pub const SHT_NOBITS: u32 = 8;

/// Section type: dynamic symbol table.
pub const SHT_DYNSYM: u32 = 11;

/// Size of an ELF64 section header entry (64 bytes).
pub const ELF64_SHDR_SIZE: usize = 64;

/// Parsed ELF64 section header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64SectionHeader {
    /// Offset into the section header string table for this section's name.
    pub sh_name: u32,
    /// Section type (`SHT_SYMTAB`, `SHT_STRTAB`, etc.).
    pub sh_type: u32,
    /// Section flags.
    pub sh_flags: u64,
    /// Virtual address of the section in memory (0 for non-loaded sections).
    pub sh_addr: u64,
    /// File offset of the section data.
    pub sh_offset: u64,
    /// Size of the section data in bytes.
    pub sh_size: u64,
    /// Associated section index (e.g., `.strtab` index for `.symtab`).
    pub sh_link: u32,
    /// Extra info (interpretation depends on section type).
    pub sh_info: u32,
    /// Required alignment of the section.
    pub sh_addralign: u64,
    /// Size of each entry (for sections with fixed-size entries).
    pub sh_entsize: u64,
}

impl Elf64SectionHeader {
    /// Decode a section header from the first 64 bytes of `bytes`.
    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        let mut c = LeCursor::new(bytes);
        Some(Self {
            sh_name: c.u32()?,
            sh_type: c.u32()?,
            sh_flags: c.u64()?,
            sh_addr: c.u64()?,
            sh_offset: c.u64()?,
            sh_size: c.u64()?,
            sh_link: c.u32()?,
            sh_info: c.u32()?,
            sh_addralign: c.u64()?,
            sh_entsize: c.u64()?,
        })
    }

    /// Returns `true` for `SHT_SYMTAB` and `SHT_DYNSYM` sections.
    #[must_use]
    pub fn is_symbol_table(&self) -> bool {
        matches!(self.sh_type, SHT_SYMTAB | SHT_DYNSYM)
    }

    /// Number of fixed-size entries in this section (`sh_size / sh_entsize`).
    ///
    /// `index` is only used to tag the error.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::MalformedSection`] if `sh_entsize` is zero.
    pub fn entry_count(&self, index: usize) -> Result<u64, ElfError> {
        self.sh_size
            .checked_div(self.sh_entsize)
            .ok_or(ElfError::MalformedSection {
                index,
                reason: "entry size is zero",
            })
    }

    /// Read this section's contents from `source`.
    ///
    /// `SHT_NOBITS` sections have no file contents and yield an empty buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::SectionOutOfBounds`] if `sh_offset + sh_size`
    /// lies beyond the end of the file.
    pub fn read_data<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        index: usize,
    ) -> Result<Vec<u8>, ElfError> {
        if self.sh_type == SHT_NOBITS || self.sh_size == 0 {
            return Ok(Vec::new());
        }
        let out_of_bounds = || ElfError::SectionOutOfBounds {
            index,
            offset: self.sh_offset,
            size: self.sh_size,
        };
        let end = self
            .sh_offset
            .checked_add(self.sh_size)
            .ok_or_else(out_of_bounds)?;
        if end > source.size() {
            return Err(out_of_bounds());
        }
        let len = usize::try_from(self.sh_size).map_err(|_| out_of_bounds())?;
        source
            .read_vec(self.sh_offset, len)
            .map_err(|e| e.truncated_as(out_of_bounds))
    }
}

/// Parse the section header table described by `header`.
///
/// Descriptor `i` is decoded from `e_shoff + i * e_shentsize`. A file with no
/// section header table (`e_shnum == 0`) yields an empty vector without
/// reading.
///
/// # Errors
///
/// Returns [`ElfError::BadSectionEntrySize`] if entries are smaller than a
/// section header, [`ElfError::TruncatedSectionTable`] if the table extends
/// past the end of the file, and [`ElfError::SectionCountMismatch`] if the
/// decoded count differs from `e_shnum`.
pub fn parse_sections<S: ByteSource + ?Sized>(
    source: &mut S,
    header: &Elf64Header,
) -> Result<Vec<Elf64SectionHeader>, ElfError> {
    let count = usize::from(header.e_shnum);
    if count == 0 {
        return Ok(Vec::new());
    }

    let entsize = usize::from(header.e_shentsize);
    if entsize < ELF64_SHDR_SIZE {
        return Err(ElfError::BadSectionEntrySize(header.e_shentsize));
    }

    // At most 65535 * 65535 bytes, fits in usize on every host we build for.
    let total = count * entsize;
    let table = source
        .read_vec(header.e_shoff, total)
        .map_err(|e| e.truncated_as(|| ElfError::TruncatedSectionTable))?;

    let sections = table
        .chunks_exact(entsize)
        .map(Elf64SectionHeader::decode)
        .collect::<Option<Vec<_>>>()
        .ok_or(ElfError::TruncatedSectionTable)?;

    if sections.len() != count {
        return Err(ElfError::SectionCountMismatch {
            expected: count,
            found: sections.len(),
        });
    }
    Ok(sections)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::tests::make_elf_header;

    /// Section header fields for [`append_section`]; everything not set is 0.
    #[derive(Default, Clone, Copy)]
    pub(crate) struct Shdr {
        pub sh_name: u32,
        pub sh_type: u32,
        pub sh_offset: u64,
        pub sh_size: u64,
        pub sh_link: u32,
        pub sh_info: u32,
        pub sh_entsize: u64,
    }

    /// Append a section header to the ELF buffer and bump `e_shnum`.
    ///
    /// Sets `e_shoff` to the current end of the buffer when the first section
    /// is appended.
    pub(crate) fn append_section(buf: &mut Vec<u8>, shdr: Shdr) {
        let shnum = u16::from_le_bytes([buf[60], buf[61]]);
        if shnum == 0 {
            let shoff = buf.len() as u64;
            buf[40..48].copy_from_slice(&shoff.to_le_bytes());
        }

        let start = buf.len();
        buf.resize(start + ELF64_SHDR_SIZE, 0);
        let b = &mut buf[start..];

        b[0..4].copy_from_slice(&shdr.sh_name.to_le_bytes());
        b[4..8].copy_from_slice(&shdr.sh_type.to_le_bytes());
        // sh_flags, sh_addr at 8..24 stay zero
        b[24..32].copy_from_slice(&shdr.sh_offset.to_le_bytes());
        b[32..40].copy_from_slice(&shdr.sh_size.to_le_bytes());
        b[40..44].copy_from_slice(&shdr.sh_link.to_le_bytes());
        b[44..48].copy_from_slice(&shdr.sh_info.to_le_bytes());
        b[48..56].copy_from_slice(&1u64.to_le_bytes());
        b[56..64].copy_from_slice(&shdr.sh_entsize.to_le_bytes());

        buf[60..62].copy_from_slice(&(shnum + 1).to_le_bytes());
    }

    fn parse(buf: &[u8]) -> Result<Vec<Elf64SectionHeader>, ElfError> {
        let mut src = buf;
        let header = Elf64Header::parse(&mut src)?;
        parse_sections(&mut src, &header)
    }

    #[test]
    fn no_sections_yields_empty_table() {
        let buf = make_elf_header();
        assert_eq!(parse(&buf).expect("valid ELF").len(), 0);
    }

    #[test]
    fn decodes_every_entry_in_order() {
        let mut buf = make_elf_header();
        append_section(&mut buf, Shdr::default());
        for i in 1..=4u32 {
            append_section(
                &mut buf,
                Shdr {
                    sh_name: i * 10,
                    sh_type: SHT_PROGBITS,
                    sh_offset: u64::from(i) * 0x100,
                    sh_size: u64::from(i),
                    sh_link: i - 1,
                    ..Shdr::default()
                },
            );
        }

        let sections = parse(&buf).expect("valid ELF");
        assert_eq!(sections.len(), 5);
        assert_eq!(sections[0].sh_type, SHT_NULL);
        for (i, s) in sections.iter().enumerate().skip(1) {
            let i = i as u32;
            assert_eq!(s.sh_name, i * 10);
            assert_eq!(s.sh_offset, u64::from(i) * 0x100);
            assert_eq!(s.sh_link, i - 1);
            assert_eq!(s.sh_addralign, 1);
        }
    }

    #[test]
    fn honours_larger_entry_size() {
        // Entries padded to 80 bytes: descriptor i lives at e_shoff + i * 80.
        let mut buf = make_elf_header();
        let shoff = buf.len() as u64;
        buf[40..48].copy_from_slice(&shoff.to_le_bytes());
        buf[58..60].copy_from_slice(&80u16.to_le_bytes());
        buf[60..62].copy_from_slice(&3u16.to_le_bytes());
        for i in 0..3u32 {
            let mut entry = vec![0u8; 80];
            entry[0..4].copy_from_slice(&(i + 100).to_le_bytes());
            entry[4..8].copy_from_slice(&SHT_STRTAB.to_le_bytes());
            entry[64..80].fill(0xee);
            buf.extend_from_slice(&entry);
        }

        let sections = parse(&buf).expect("valid ELF");
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[2].sh_name, 102);
        assert_eq!(sections[2].sh_type, SHT_STRTAB);
    }

    #[test]
    fn truncated_table_is_rejected() {
        let mut buf = make_elf_header();
        append_section(&mut buf, Shdr::default());
        append_section(&mut buf, Shdr { sh_type: SHT_SYMTAB, ..Shdr::default() });
        buf.truncate(buf.len() - 10);
        assert!(matches!(parse(&buf), Err(ElfError::TruncatedSectionTable)));
    }

    #[test]
    fn short_entry_size_is_rejected() {
        let mut buf = make_elf_header();
        append_section(&mut buf, Shdr::default());
        buf[58..60].copy_from_slice(&40u16.to_le_bytes());
        assert!(matches!(parse(&buf), Err(ElfError::BadSectionEntrySize(40))));
    }

    #[test]
    fn entry_count_guards_zero_entsize() {
        let shdr = Elf64SectionHeader::decode(&[0u8; ELF64_SHDR_SIZE]).expect("64 bytes");
        let shdr = Elf64SectionHeader {
            sh_size: 48,
            ..shdr
        };
        assert!(matches!(
            shdr.entry_count(4),
            Err(ElfError::MalformedSection { index: 4, .. })
        ));
        let shdr = Elf64SectionHeader {
            sh_entsize: 24,
            ..shdr
        };
        assert_eq!(shdr.entry_count(4).expect("non-zero entsize"), 2);
    }

    #[test]
    fn read_data_bounds_check() {
        let mut buf = make_elf_header();
        let data_off = buf.len() as u64;
        buf.extend_from_slice(b"\0abc\0");
        let mut src = buf.as_slice();

        let mut shdr = Elf64SectionHeader::decode(&[0u8; ELF64_SHDR_SIZE]).expect("64 bytes");
        shdr.sh_type = SHT_STRTAB;
        shdr.sh_offset = data_off;
        shdr.sh_size = 5;
        assert_eq!(shdr.read_data(&mut src, 1).expect("in bounds"), b"\0abc\0");

        shdr.sh_size = 6;
        assert!(matches!(
            shdr.read_data(&mut src, 1),
            Err(ElfError::SectionOutOfBounds { index: 1, .. })
        ));

        shdr.sh_offset = u64::MAX;
        assert!(matches!(
            shdr.read_data(&mut src, 1),
            Err(ElfError::SectionOutOfBounds { .. })
        ));

        shdr.sh_type = SHT_NOBITS;
        assert!(shdr.read_data(&mut src, 1).expect("nobits").is_empty());
    }
}
