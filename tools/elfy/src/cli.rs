//! Command-line interface definitions for elfy.

use std::path::PathBuf;

use clap::Parser;

/// Print the demangled names of every symbol in ELF64 object files.
#[derive(Parser, Debug)]
#[command(name = "elfy", version, about)]
pub struct Cli {
    /// ELF files to inspect.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Print raw symbol names without demangling.
    #[arg(long)]
    pub no_demangle: bool,

    /// Report a broken symbol table and continue with the next one instead
    /// of stopping at the first error.
    #[arg(long, short = 'k')]
    pub keep_going: bool,

    /// Suppress the closing summary; only symbol names and errors are printed.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Describe the header and each symbol table on stderr while dumping.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
