//! Symbol dumping: walks every symbol table and writes one name per line.
//!
//! [`SymbolDump`] is the lazy core. It visits sections in table order and,
//! for each `SHT_SYMTAB`/`SHT_DYNSYM`, decodes the records, loads the string
//! table named by `sh_link`, and yields each non-empty demangled name. A
//! broken table yields a single [`DumpError`] and the walk moves on to the
//! next section, so the caller picks fail-fast or keep-going.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use elfy_elf::{ByteSource, Elf64Symbol, ElfError, ElfFile, StringTable};

use crate::demangle::Demangler;
use crate::verbose::{dprintln, vprintln};

/// A symbol table that could not be dumped.
#[derive(Debug)]
pub struct DumpError {
    /// Index of the symbol table section.
    pub section: usize,
    /// What went wrong.
    pub error: ElfError,
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section [{}]: {}", self.section, self.error)
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// The symbol table currently being walked.
struct OpenTable {
    section: usize,
    symbols: std::vec::IntoIter<Elf64Symbol>,
    strtab: StringTable,
}

impl OpenTable {
    /// Next printable name in this table, or `None` once it is exhausted.
    fn next_name(&mut self, demangler: Demangler) -> Option<Result<String, ElfError>> {
        for sym in self.symbols.by_ref() {
            // Unnamed entries, including the null symbol at index 0.
            if sym.st_name == 0 {
                continue;
            }
            let raw = match self.strtab.lookup(sym.st_name) {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e)),
            };
            let name = demangler.apply(&raw);
            if name.is_empty() {
                continue;
            }
            return Some(Ok(name.into_owned()));
        }
        None
    }
}

/// Lazy, single-pass iterator over the printable symbol names of a file.
pub struct SymbolDump<'e, S> {
    elf: &'e mut ElfFile<S>,
    demangler: Demangler,
    next_section: usize,
    current: Option<OpenTable>,
}

impl<'e, S: ByteSource> SymbolDump<'e, S> {
    /// Start a dump of every symbol table in `elf`.
    pub fn new(elf: &'e mut ElfFile<S>, demangler: Demangler) -> Self {
        Self {
            elf,
            demangler,
            next_section: 0,
            current: None,
        }
    }

    /// Decode the symbols and linked string table of section `index`.
    ///
    /// Returns `None` for a table without symbols; its link is not examined.
    fn open(&mut self, index: usize) -> Result<Option<OpenTable>, ElfError> {
        let symbols = self.elf.symbols(index)?;
        if symbols.is_empty() {
            vprintln!("  [{index}] {}: empty", self.section_label(index));
            return Ok(None);
        }
        let strtab = self.elf.linked_strtab(index)?;
        vprintln!(
            "  [{index}] {}: {} symbols, {} byte string table",
            self.section_label(index),
            symbols.len(),
            strtab.len()
        );
        Ok(Some(OpenTable {
            section: index,
            symbols: symbols.into_iter(),
            strtab,
        }))
    }

    fn section_label(&self, index: usize) -> &str {
        self.elf.section_name(index).unwrap_or("<unnamed>")
    }
}

impl<S: ByteSource> Iterator for SymbolDump<'_, S> {
    type Item = Result<String, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(table) = &mut self.current {
                match table.next_name(self.demangler) {
                    Some(Ok(name)) => return Some(Ok(name)),
                    Some(Err(error)) => {
                        let section = table.section;
                        self.current = None;
                        return Some(Err(DumpError { section, error }));
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                }
            }

            let index = self.next_section;
            let section = self.elf.section(index)?;
            self.next_section += 1;
            if !section.is_symbol_table() {
                continue;
            }
            match self.open(index) {
                Ok(table) => self.current = table,
                Err(error) => {
                    return Some(Err(DumpError {
                        section: index,
                        error,
                    }));
                }
            }
        }
    }
}

/// Options for [`dump`].
#[derive(Clone, Copy, Debug)]
pub struct DumpOptions {
    /// How names are demangled.
    pub demangler: Demangler,
    /// Keep going after a broken symbol table.
    pub keep_going: bool,
}

/// Result of a completed [`dump`].
#[derive(Debug, Default)]
pub struct DumpSummary {
    /// Number of names written.
    pub names: usize,
    /// Number of symbol tables that failed (only counted with `keep_going`).
    pub failed: usize,
}

/// Write every symbol name of `elf` to `out`, one per line.
///
/// # Errors
///
/// Fails with the first [`DumpError`] unless `options.keep_going` is set, in
/// which case broken tables are reported on stderr and collected into the
/// summary. Write errors always fail.
pub fn dump<S: ByteSource, W: Write>(
    elf: &mut ElfFile<S>,
    out: &mut W,
    options: DumpOptions,
) -> Result<DumpSummary> {
    let mut summary = DumpSummary::default();
    for item in SymbolDump::new(elf, options.demangler) {
        match item {
            Ok(name) => {
                writeln!(out, "{name}").context("writing symbol names")?;
                summary.names += 1;
            }
            Err(err) if options.keep_going => {
                eprintln!("warning: {err}");
                summary.failed += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    out.flush().context("writing symbol names")?;

    if options.keep_going {
        dprintln!(
            "{} names written, {} symbol tables failed",
            summary.names,
            summary.failed
        );
    }
    Ok(summary)
}
