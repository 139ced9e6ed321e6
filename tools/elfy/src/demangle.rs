//! Symbol name demangling.

use std::borrow::Cow;

use cpp_demangle::{DemangleOptions, Symbol};

/// How raw symbol names are turned into printable ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Demangler {
    /// Demangle Rust (legacy and v0) and Itanium C++ names, leaving anything
    /// else untouched.
    Auto,
    /// Print names exactly as stored in the string table.
    Raw,
}

impl Demangler {
    /// Apply this demangler to `raw`.
    pub fn apply(self, raw: &str) -> Cow<'_, str> {
        match self {
            Self::Auto => demangle(raw),
            Self::Raw => Cow::Borrowed(raw),
        }
    }
}

/// Demangle `raw`, returning it unchanged if it is not a mangled name.
///
/// Rust is tried first: legacy Rust symbols are also valid Itanium names and
/// would otherwise come out as C++ with the hash segment attached. The
/// trailing hash of legacy Rust symbols is dropped.
pub fn demangle(raw: &str) -> Cow<'_, str> {
    if let Ok(name) = rustc_demangle::try_demangle(raw) {
        return Cow::Owned(format!("{name:#}"));
    }
    Symbol::new(raw)
        .ok()
        .and_then(|sym| sym.demangle(&DemangleOptions::default()).ok())
        .map_or(Cow::Borrowed(raw), Cow::Owned)
}
