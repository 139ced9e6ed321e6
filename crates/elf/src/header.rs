//! ELF64 file header parsing.
//!
//! Reads the identification block and the fixed-size file header through a
//! [`ByteSource`] and decodes every field explicitly from little-endian bytes.

use core::fmt;
use std::error::Error;
use std::io;
use std::path::PathBuf;

use crate::source::ByteSource;

/// ELF magic bytes: `\x7fELF`.
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Size of the identification block at the start of every ELF file.
pub const EI_NIDENT: usize = 16;

/// ELF class: 32-bit.
pub const ELFCLASS32: u8 = 1;

/// ELF class: 64-bit.
pub const ELFCLASS64: u8 = 2;

/// ELF data encoding: little-endian.
pub const ELFDATA2LSB: u8 = 1;

/// ELF data encoding: big-endian.
pub const ELFDATA2MSB: u8 = 2;

/// ELF type: relocatable object.
pub const ET_REL: u16 = 1;

/// ELF type: executable.
pub const ET_EXEC: u16 = 2;

/// ELF type: shared object (PIE).
pub const ET_DYN: u16 = 3;

/// ELF machine: x86-64.
pub const EM_X86_64: u16 = 62;

/// Size of an ELF64 file header (64 bytes).
pub const ELF64_EHDR_SIZE: usize = 64;

/// Errors that can occur when reading an ELF file.
#[derive(Debug)]
pub enum ElfError {
    /// The file could not be opened for reading.
    Open {
        /// Path that was passed to the opener.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
    /// A read failed for a reason other than running out of bytes.
    Io {
        /// Absolute file offset of the failed read.
        offset: u64,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Fewer bytes are available than a fixed-size read requires.
    TruncatedRead {
        /// Absolute file offset of the read.
        offset: u64,
        /// Number of bytes requested.
        len: usize,
    },
    /// The file does not start with the ELF magic bytes.
    BadMagic,
    /// The identification block declares a class other than `ELFCLASS64`.
    UnsupportedClass(u8),
    /// The identification block declares an encoding other than little-endian.
    UnsupportedEncoding(u8),
    /// The file ends inside the 64-byte file header.
    TruncatedHeader,
    /// `e_shentsize` is too small to hold a section header.
    BadSectionEntrySize(u16),
    /// The file ends inside the section header table.
    TruncatedSectionTable,
    /// The number of decoded section headers differs from `e_shnum`.
    SectionCountMismatch {
        /// Count declared by the file header.
        expected: usize,
        /// Count actually decoded.
        found: usize,
    },
    /// A section's header fields cannot describe its contents.
    MalformedSection {
        /// Index of the offending section.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A section's contents extend past the end of the file.
    SectionOutOfBounds {
        /// Index of the offending section.
        index: usize,
        /// Declared `sh_offset`.
        offset: u64,
        /// Declared `sh_size`.
        size: u64,
    },
    /// A section's `sh_link` does not name an existing section.
    InvalidLink {
        /// Index of the section holding the link.
        index: usize,
        /// The out-of-range link value.
        link: u32,
    },
    /// A name offset points outside its string table.
    NameOutOfBounds {
        /// The out-of-range offset.
        offset: u32,
        /// Size of the string table in bytes.
        len: usize,
    },
}

impl ElfError {
    /// Replaces a [`ElfError::TruncatedRead`] with a more specific error,
    /// passing every other error through.
    pub(crate) fn truncated_as(self, f: impl FnOnce() -> ElfError) -> ElfError {
        match self {
            Self::TruncatedRead { .. } => f(),
            other => other,
        }
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, .. } => write!(f, "could not open {}", path.display()),
            Self::Io { offset, .. } => write!(f, "read failed at offset {offset:#x}"),
            Self::TruncatedRead { offset, len } => {
                write!(f, "truncated read of {len} bytes at offset {offset:#x}")
            }
            Self::BadMagic => write!(f, "invalid ELF magic bytes"),
            Self::UnsupportedClass(class) => {
                write!(f, "unsupported ELF class {class} (expected ELFCLASS64)")
            }
            Self::UnsupportedEncoding(data) => {
                write!(f, "unsupported data encoding {data} (expected little-endian)")
            }
            Self::TruncatedHeader => write!(f, "file header truncated"),
            Self::BadSectionEntrySize(size) => {
                write!(f, "section header entry size {size} is smaller than 64 bytes")
            }
            Self::TruncatedSectionTable => write!(f, "section header table truncated"),
            Self::SectionCountMismatch { expected, found } => {
                write!(f, "expected {expected} section headers, decoded {found}")
            }
            Self::MalformedSection { index, reason } => {
                write!(f, "section [{index}] is malformed: {reason}")
            }
            Self::SectionOutOfBounds { index, offset, size } => write!(
                f,
                "section [{index}] ({size:#x} bytes at {offset:#x}) extends past end of file"
            ),
            Self::InvalidLink { index, link } => {
                write!(f, "section [{index}] links to nonexistent section {link}")
            }
            Self::NameOutOfBounds { offset, len } => {
                write!(f, "name offset {offset:#x} outside string table of {len} bytes")
            }
        }
    }
}

impl Error for ElfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Little-endian field reader over a byte slice.
///
/// Every accessor returns `None` once the slice is exhausted instead of
/// panicking, so decoders can be written with `?`.
pub(crate) struct LeCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LeCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes: [u8; N] = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    pub(crate) fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|[b]| b)
    }

    pub(crate) fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self) -> Option<u64> {
        self.array().map(u64::from_le_bytes)
    }
}

/// Parsed ELF64 file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Header {
    /// File class (`ELFCLASS64`).
    pub ei_class: u8,
    /// Data encoding (`ELFDATA2LSB`).
    pub ei_data: u8,
    /// Identification block version.
    pub ei_version: u8,
    /// Target OS ABI.
    pub ei_osabi: u8,
    /// ABI version.
    pub ei_abiversion: u8,
    /// Object file type (`ET_REL`, `ET_EXEC`, `ET_DYN`, ...).
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Object file version.
    pub e_version: u32,
    /// Virtual address of the entry point.
    pub e_entry: u64,
    /// Offset of the program header table in the file.
    pub e_phoff: u64,
    /// Offset of the section header table in the file.
    pub e_shoff: u64,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Size of this header.
    pub e_ehsize: u16,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl Elf64Header {
    /// Parse an ELF64 file header from the start of `source`.
    ///
    /// The magic bytes are checked before anything else is trusted. The class
    /// and data encoding must be 64-bit little-endian; other variants are
    /// rejected rather than misread.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::BadMagic`] if the file is not ELF,
    /// [`ElfError::TruncatedHeader`] if it ends inside the header, and the
    /// class/encoding errors for unsupported variants.
    pub fn parse<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, ElfError> {
        let mut ident = [0u8; EI_NIDENT];
        let available = usize::try_from(source.size()).map_or(EI_NIDENT, |n| n.min(EI_NIDENT));
        source
            .read_at(0, &mut ident[..available])
            .map_err(|e| e.truncated_as(|| ElfError::TruncatedHeader))?;

        if available < ELF_MAGIC.len() || ident[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        if available < EI_NIDENT {
            return Err(ElfError::TruncatedHeader);
        }

        if ident[4] != ELFCLASS64 {
            return Err(ElfError::UnsupportedClass(ident[4]));
        }
        if ident[5] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding(ident[5]));
        }

        let mut rest = [0u8; ELF64_EHDR_SIZE - EI_NIDENT];
        source
            .read_at(EI_NIDENT as u64, &mut rest)
            .map_err(|e| e.truncated_as(|| ElfError::TruncatedHeader))?;

        Self::decode(&ident, &rest).ok_or(ElfError::TruncatedHeader)
    }

    /// Decode the header fields that follow the identification block.
    fn decode(ident: &[u8; EI_NIDENT], rest: &[u8]) -> Option<Self> {
        let mut c = LeCursor::new(rest);
        Some(Self {
            ei_class: ident[4],
            ei_data: ident[5],
            ei_version: ident[6],
            ei_osabi: ident[7],
            ei_abiversion: ident[8],
            e_type: c.u16()?,
            e_machine: c.u16()?,
            e_version: c.u32()?,
            e_entry: c.u64()?,
            e_phoff: c.u64()?,
            e_shoff: c.u64()?,
            e_flags: c.u32()?,
            e_ehsize: c.u16()?,
            e_phentsize: c.u16()?,
            e_phnum: c.u16()?,
            e_shentsize: c.u16()?,
            e_shnum: c.u16()?,
            e_shstrndx: c.u16()?,
        })
    }

    /// Total size in bytes of the section header table.
    #[must_use]
    pub fn section_table_size(&self) -> u64 {
        u64::from(self.e_shnum) * u64::from(self.e_shentsize)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Size of an ELF64 section header entry, as written into test headers.
    const SHDR_SIZE: u16 = 64;

    /// Build a minimal valid ELF64 header (64 bytes) as a `Vec<u8>`.
    ///
    /// Defaults: `ET_REL`, `EM_X86_64`, entry=0x401000, no program headers,
    /// no sections.
    pub(crate) fn make_elf_header() -> Vec<u8> {
        let mut buf = vec![0u8; ELF64_EHDR_SIZE];

        // Magic
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        // Class: ELFCLASS64
        buf[4] = ELFCLASS64;
        // Data: little-endian
        buf[5] = ELFDATA2LSB;
        // Version
        buf[6] = 1;
        // e_type: ET_REL
        buf[16..18].copy_from_slice(&ET_REL.to_le_bytes());
        // e_machine: EM_X86_64
        buf[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        // e_version
        buf[20..24].copy_from_slice(&1u32.to_le_bytes());
        // e_entry
        buf[24..32].copy_from_slice(&0x0040_1000u64.to_le_bytes());
        // e_ehsize
        buf[52..54].copy_from_slice(&(ELF64_EHDR_SIZE as u16).to_le_bytes());
        // e_shentsize
        buf[58..60].copy_from_slice(&SHDR_SIZE.to_le_bytes());

        buf
    }

    #[test]
    fn parse_valid_header() {
        let buf = make_elf_header();
        let hdr = Elf64Header::parse(&mut buf.as_slice()).expect("valid header");
        assert_eq!(hdr.ei_class, ELFCLASS64);
        assert_eq!(hdr.ei_data, ELFDATA2LSB);
        assert_eq!(hdr.e_type, ET_REL);
        assert_eq!(hdr.e_machine, EM_X86_64);
        assert_eq!(hdr.e_version, 1);
        assert_eq!(hdr.e_entry, 0x0040_1000);
        assert_eq!(hdr.e_ehsize, 64);
        assert_eq!(hdr.e_shentsize, SHDR_SIZE);
        assert_eq!(hdr.e_shnum, 0);
    }

    #[test]
    fn parse_is_deterministic() {
        let mut buf = make_elf_header();
        buf[40..48].copy_from_slice(&0x1234u64.to_le_bytes());
        buf[60..62].copy_from_slice(&7u16.to_le_bytes());
        buf[62..64].copy_from_slice(&6u16.to_le_bytes());
        let first = Elf64Header::parse(&mut buf.as_slice()).expect("valid header");
        let second = Elf64Header::parse(&mut buf.as_slice()).expect("valid header");
        assert_eq!(first, second);
        assert_eq!(first.e_shoff, 0x1234);
        assert_eq!(first.e_shnum, 7);
        assert_eq!(first.e_shstrndx, 6);
        assert_eq!(first.section_table_size(), 7 * 64);
    }

    #[test]
    fn accepts_any_object_type_and_machine() {
        let mut buf = make_elf_header();
        buf[16..18].copy_from_slice(&ET_DYN.to_le_bytes());
        buf[18..20].copy_from_slice(&183u16.to_le_bytes()); // EM_AARCH64
        let hdr = Elf64Header::parse(&mut buf.as_slice()).expect("valid header");
        assert_eq!(hdr.e_type, ET_DYN);
        assert_eq!(hdr.e_machine, 183);
    }

    #[test]
    fn reject_bad_magic() {
        let mut buf = make_elf_header();
        buf[0] = 0x00;
        assert!(matches!(
            Elf64Header::parse(&mut buf.as_slice()),
            Err(ElfError::BadMagic)
        ));
    }

    #[test]
    fn reject_non_elf_text() {
        let buf = b"#!/bin/sh\necho hello, this is not an object file\n";
        assert!(matches!(
            Elf64Header::parse(&mut buf.as_slice()),
            Err(ElfError::BadMagic)
        ));
    }

    #[test]
    fn reject_tiny_file_as_not_elf() {
        assert!(matches!(
            Elf64Header::parse(&mut [0x7f, b'E'].as_slice()),
            Err(ElfError::BadMagic)
        ));
        let mut empty: &[u8] = &[];
        assert!(matches!(
            Elf64Header::parse(&mut empty),
            Err(ElfError::BadMagic)
        ));
    }

    #[test]
    fn reject_truncated_ident() {
        let buf = make_elf_header();
        assert!(matches!(
            Elf64Header::parse(&mut &buf[..10]),
            Err(ElfError::TruncatedHeader)
        ));
    }

    #[test]
    fn reject_truncated_header() {
        let buf = make_elf_header();
        assert!(matches!(
            Elf64Header::parse(&mut &buf[..40]),
            Err(ElfError::TruncatedHeader)
        ));
    }

    #[test]
    fn reject_32bit_class() {
        let mut buf = make_elf_header();
        buf[4] = ELFCLASS32;
        assert!(matches!(
            Elf64Header::parse(&mut buf.as_slice()),
            Err(ElfError::UnsupportedClass(ELFCLASS32))
        ));
    }

    #[test]
    fn reject_big_endian() {
        let mut buf = make_elf_header();
        buf[5] = ELFDATA2MSB;
        assert!(matches!(
            Elf64Header::parse(&mut buf.as_slice()),
            Err(ElfError::UnsupportedEncoding(ELFDATA2MSB))
        ));
    }

    #[test]
    fn cursor_stops_at_end() {
        let mut c = LeCursor::new(&[1, 2, 3]);
        assert_eq!(c.u16(), Some(0x0201));
        assert_eq!(c.u16(), None);
        assert_eq!(c.u8(), Some(3));
        assert_eq!(c.u8(), None);
    }

    #[test]
    fn display_errors() {
        let errors = [
            ElfError::BadMagic,
            ElfError::UnsupportedClass(1),
            ElfError::UnsupportedEncoding(2),
            ElfError::TruncatedHeader,
            ElfError::TruncatedSectionTable,
            ElfError::BadSectionEntrySize(12),
            ElfError::MalformedSection { index: 3, reason: "entry size is zero" },
            ElfError::InvalidLink { index: 2, link: 99 },
            ElfError::NameOutOfBounds { offset: 40, len: 8 },
        ];
        for err in &errors {
            let msg = format!("{err}");
            assert!(!msg.is_empty());
        }
    }
}
