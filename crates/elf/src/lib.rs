//! ELF64 symbol table reader for `elfy`.
//!
//! Reads the file header, the section header table, symbol tables
//! (`SHT_SYMTAB`/`SHT_DYNSYM`) and string tables through a [`ByteSource`],
//! decoding every record field by field from little-endian bytes. Every
//! offset and count taken from the file is bounds-checked before it is used.
//!
//! # Usage
//!
//! ```no_run
//! use elfy_elf::{ElfFile, FileSource};
//!
//! fn list(path: &str) -> Result<(), elfy_elf::ElfError> {
//!     let mut elf = ElfFile::parse(FileSource::open(path)?)?;
//!     let tables: Vec<usize> = elf.symbol_tables().map(|(i, _)| i).collect();
//!     for index in tables {
//!         let strtab = elf.linked_strtab(index)?;
//!         for sym in elf.symbols(index)? {
//!             println!("{}", strtab.lookup(sym.st_name)?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod file;
pub mod header;
pub mod section;
pub mod source;
pub mod strtab;
pub mod symbol;

pub use file::ElfFile;
pub use header::{Elf64Header, ElfError};
pub use section::{Elf64SectionHeader, SHT_DYNSYM, SHT_NOBITS, SHT_STRTAB, SHT_SYMTAB, parse_sections};
pub use source::{ByteSource, FileSource};
pub use strtab::StringTable;
pub use symbol::{Elf64Symbol, STB_GLOBAL, STB_WEAK, STT_FUNC, STT_OBJECT, SHN_UNDEF, extract_symbols};
