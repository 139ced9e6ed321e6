//! Positioned, exact-length reads over the bytes of an ELF image.
//!
//! [`FileSource`] reads from a file on disk; `&[u8]` implements
//! [`ByteSource`] for images already in memory.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::header::ElfError;

/// Random-access, read-only view of an ELF image.
///
/// Reads are all-or-nothing: a read that would extend past [`size`] fails
/// with [`ElfError::TruncatedRead`] before touching the underlying storage.
///
/// [`size`]: ByteSource::size
pub trait ByteSource {
    /// Total number of bytes in the image.
    fn size(&self) -> u64;

    /// Fill `buf` with the bytes starting at absolute offset `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::TruncatedRead`] if fewer than `buf.len()` bytes are
    /// available at `offset`, or [`ElfError::Io`] if the storage fails.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ElfError>;

    /// Read `len` bytes at `offset` into a freshly allocated buffer.
    ///
    /// The range is checked against [`size`](ByteSource::size) before
    /// allocating, so a corrupt length cannot trigger a huge allocation.
    ///
    /// # Errors
    ///
    /// Same as [`read_at`](ByteSource::read_at).
    fn read_vec(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, ElfError> {
        check_range(self.size(), offset, len)?;
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// Fails with [`ElfError::TruncatedRead`] unless `offset..offset + len` lies
/// within an image of `size` bytes.
fn check_range(size: u64, offset: u64, len: usize) -> Result<(), ElfError> {
    let end = u64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len));
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(ElfError::TruncatedRead { offset, len }),
    }
}

impl ByteSource for &[u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "range already checked against the slice length"
    )]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ElfError> {
        check_range(self.size(), offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self[start..start + buf.len()]);
        Ok(())
    }
}

/// A [`ByteSource`] backed by an open file.
///
/// The file handle is closed when the source is dropped.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    /// Open `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Open`] if the path does not exist, cannot be read,
    /// or is a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ElfError> {
        let path = path.as_ref();
        let open_err = |source| ElfError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;
        let metadata = file.metadata().map_err(open_err)?;
        if metadata.is_dir() {
            return Err(open_err(io::Error::from(io::ErrorKind::IsADirectory)));
        }

        Ok(Self {
            file,
            size: metadata.len(),
        })
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ElfError> {
        check_range(self.size, offset, buf.len())?;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|source| match source.kind() {
                // The file shrank underneath us.
                io::ErrorKind::UnexpectedEof => ElfError::TruncatedRead {
                    offset,
                    len: buf.len(),
                },
                _ => ElfError::Io { offset, source },
            })
    }
}
