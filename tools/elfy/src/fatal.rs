//! Fatal error reporting.
//!
//! Every error that ends a run is turned into one diagnostic line on stderr
//! and a distinct process exit code.

use std::fmt::Display;
use std::io::{self, Write};
use std::process;

use elfy_elf::ElfError;

use crate::dump::DumpError;

/// No input file, or an unusable command line.
pub const EXIT_USAGE: i32 = 1;
/// The input file could not be opened or read.
pub const EXIT_OPEN: i32 = 2;
/// The input is not an ELF file, or not a 64-bit little-endian one.
pub const EXIT_NOT_ELF: i32 = 5;
/// The file header is truncated.
pub const EXIT_HEADER: i32 = 6;
/// The section header table is truncated or malformed.
pub const EXIT_SECTION_TABLE: i32 = 7;
/// A symbol table could not be dumped.
pub const EXIT_SYMBOLS: i32 = 8;
/// Symbol names could not be written to stdout.
pub const EXIT_OUTPUT: i32 = 9;

/// Print `message` to stderr and terminate the process with `code`.
pub fn report_fatal(code: i32, message: impl Display) -> ! {
    eprintln!("{message}");
    process::exit(code)
}

/// Returns `true` if `err` comes from writing into a closed pipe.
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::BrokenPipe)
}

/// Flush names still buffered for stdout ahead of an exit.
///
/// Returns `None` on success. On failure returns the exit code the run
/// should end with: 0 for a closed pipe, otherwise [`EXIT_OUTPUT`] after
/// reporting the lost output on stderr.
pub fn flush_pending<W: Write>(out: &mut W) -> Option<i32> {
    let err = out.flush().err()?;
    if err.kind() == io::ErrorKind::BrokenPipe {
        return Some(0);
    }
    eprintln!("Could not write symbol names! ({err})");
    Some(EXIT_OUTPUT)
}

/// Exit code and diagnostic message for an error that ended the run.
pub fn diagnose(err: &anyhow::Error) -> (i32, String) {
    if let Some(dump) = err.chain().find_map(|e| e.downcast_ref::<DumpError>()) {
        return (EXIT_SYMBOLS, format!("Could not dump symbols: {dump}"));
    }
    if let Some(elf) = err.chain().find_map(|e| e.downcast_ref::<ElfError>()) {
        return diagnose_elf(elf);
    }
    if err.chain().any(|e| e.downcast_ref::<io::Error>().is_some()) {
        return (EXIT_OUTPUT, format!("{err:#}"));
    }
    (EXIT_USAGE, format!("{err:#}"))
}

fn diagnose_elf(err: &ElfError) -> (i32, String) {
    match err {
        ElfError::Open { .. } => (EXIT_OPEN, "Could not open binary file!".into()),
        ElfError::Io { source, .. } => (EXIT_OPEN, format!("Could not read binary file! ({source})")),
        ElfError::BadMagic => (EXIT_NOT_ELF, "This file is not an ELF file!".into()),
        ElfError::UnsupportedClass(_) | ElfError::UnsupportedEncoding(_) => {
            (EXIT_NOT_ELF, format!("Unsupported ELF file: {err}"))
        }
        ElfError::TruncatedHeader => (EXIT_HEADER, "Could not parse elf header!".into()),
        ElfError::BadSectionEntrySize(_)
        | ElfError::TruncatedSectionTable
        | ElfError::SectionCountMismatch { .. } => {
            (EXIT_SECTION_TABLE, "Could not parse section header!".into())
        }
        ElfError::TruncatedRead { .. }
        | ElfError::MalformedSection { .. }
        | ElfError::SectionOutOfBounds { .. }
        | ElfError::InvalidLink { .. }
        | ElfError::NameOutOfBounds { .. } => {
            (EXIT_SYMBOLS, format!("Could not dump symbols: {err}"))
        }
    }
}
