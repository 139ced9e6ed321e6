//! elfy: print the demangled names of every symbol in ELF64 files.
//!
//! Pipeline per file: open → parse file header → parse section header
//! table → for each symbol table, decode records and resolve names through
//! the linked string table → demangle → one name per line on stdout.
//!
//! The first fatal condition is reported on stderr and ends the run with a
//! distinct exit code (see [`fatal`]).

mod cli;
mod demangle;
mod dump;
mod fatal;
mod verbose;

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use elfy_elf::{ElfFile, FileSource};

use crate::demangle::Demangler;
use crate::dump::{DumpOptions, DumpSummary};
use crate::verbose::{Timer, vprintln};

fn main() {
    let cli = parse_cli();
    verbose::init(cli.quiet, cli.verbose);

    if cli.files.is_empty() {
        fatal::report_fatal(fatal::EXIT_USAGE, "Need more arguments!");
    }

    let options = DumpOptions {
        demangler: if cli.no_demangle {
            Demangler::Raw
        } else {
            Demangler::Auto
        },
        keep_going: cli.keep_going,
    };
    let with_headings = cli.files.len() > 1;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut failed_tables = 0;

    for (i, path) in cli.files.iter().enumerate() {
        let heading = with_headings.then_some(i == 0);
        match dump_file(path, &mut out, options, heading) {
            Ok(summary) => failed_tables += summary.failed,
            Err(err) => {
                // The names written so far still go out; a failure here is
                // reported, but the error that ended the run sets the code.
                let _ = fatal::flush_pending(&mut out);
                if fatal::is_broken_pipe(&err) {
                    process::exit(0);
                }
                let (code, message) = fatal::diagnose(&err);
                vprintln!("error: {err:#}");
                if with_headings {
                    fatal::report_fatal(code, format_args!("{}: {message}", path.display()));
                }
                fatal::report_fatal(code, message);
            }
        }
    }

    if let Some(code) = fatal::flush_pending(&mut out) {
        process::exit(code);
    }
    if failed_tables > 0 {
        fatal::report_fatal(
            fatal::EXIT_SYMBOLS,
            format_args!("Could not dump symbols: {failed_tables} symbol tables failed"),
        );
    }
}

/// Parse the command line; usage errors exit with [`fatal::EXIT_USAGE`],
/// `--help` and `--version` exit successfully.
fn parse_cli() -> cli::Cli {
    cli::Cli::try_parse().unwrap_or_else(|err| {
        if err.use_stderr() {
            let _ = err.print();
            process::exit(fatal::EXIT_USAGE);
        }
        err.exit()
    })
}

/// Dump the symbol names of the file at `path` into `out`.
///
/// `heading` is `Some(first)` when several files are dumped: a `path:` line
/// precedes the names, with a blank line before it unless this is the first
/// file.
fn dump_file<W: Write>(
    path: &Path,
    out: &mut W,
    options: DumpOptions,
    heading: Option<bool>,
) -> Result<DumpSummary> {
    let _t = Timer::start("dump");

    let mut elf = ElfFile::parse(FileSource::open(path)?)?;
    let hdr = elf.header();
    vprintln!(
        "{}: type {}, machine {}, entry {:#x}, {} sections",
        path.display(),
        hdr.e_type,
        hdr.e_machine,
        hdr.e_entry,
        elf.sections().len()
    );

    if let Some(first) = heading {
        if !first {
            writeln!(out).context("writing symbol names")?;
        }
        writeln!(out, "{}:", path.display()).context("writing symbol names")?;
    }

    dump::dump(&mut elf, out, options)
}
