//! File copy with a reusable buffer.
//!
//! Used for streaming archive entries into place and for byte-identical
//! document backups. One buffer is allocated per unit of work and reused for
//! every entry in it.

use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::io::{self};
use std::path::Path;

/// Buffer size for I/O operations (64KB).
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Heap buffer reused across copy operations.
///
/// # Examples
///
/// ```no_run
/// # use deckprep_core::copy::{CopyBuffer, copy_with_buffer};
/// # fn example() -> std::io::Result<()> {
/// let mut buffer = CopyBuffer::new();
/// let mut input = std::fs::File::open("input.txt")?;
/// let mut output = std::fs::File::create("output.txt")?;
///
/// let bytes_copied = copy_with_buffer(&mut input, &mut output, &mut buffer)?;
/// println!("Copied {} bytes", bytes_copied);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CopyBuffer {
    buf: Box<[u8]>,
}

impl CopyBuffer {
    /// Creates a new zeroed copy buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; COPY_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies data from reader to writer using the provided reusable buffer.
///
/// Returns the total number of bytes copied. Interrupted reads are retried.
///
/// # Errors
///
/// Returns an error if reading or writing fails, or if the byte count would
/// overflow `u64`.
#[inline]
pub fn copy_with_buffer<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    let mut total: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer.buf[..bytes_read])?;

        total = total
            .checked_add(bytes_read as u64)
            .ok_or_else(|| io::Error::other("byte count overflow"))?;
    }

    Ok(total)
}

/// Copies `source` to a file that must not exist yet, then syncs it to disk.
///
/// Permissions of the source are carried over. On any failure the partially
/// written destination is removed, so either a complete copy exists or none.
///
/// # Errors
///
/// Returns `AlreadyExists` if `dest` is present, or any I/O failure from the
/// copy.
pub fn copy_file_exclusive(source: &Path, dest: &Path, buffer: &mut CopyBuffer) -> io::Result<u64> {
    let mut input = File::open(source)?;
    let permissions = input.metadata()?.permissions();
    let output = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let result = (|| {
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, output);
        let copied = copy_with_buffer(&mut input, &mut writer, buffer)?;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.set_permissions(permissions)?;
        file.sync_all()?;
        Ok(copied)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_copy_buffer_default() {
        let buffer = CopyBuffer::default();
        assert_eq!(buffer.size(), 64 * 1024);
    }

    #[test]
    fn test_copy_empty_source() {
        let mut buffer = CopyBuffer::new();
        let mut input = Cursor::new(Vec::<u8>::new());
        let mut output = Vec::new();

        let copied = copy_with_buffer(&mut input, &mut output, &mut buffer).unwrap();
        assert_eq!(copied, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_copy_larger_than_buffer() {
        let mut buffer = CopyBuffer::new();
        let input_data = vec![0x42u8; 200 * 1024 + 7];
        let mut input = Cursor::new(&input_data);
        let mut output = Vec::new();

        let copied = copy_with_buffer(&mut input, &mut output, &mut buffer).unwrap();
        assert_eq!(copied, input_data.len() as u64);
        assert_eq!(output, input_data);
    }

    #[test]
    fn test_copy_file_exclusive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.bin");
        let dest = temp.path().join("a.bin.bak");
        std::fs::write(&source, b"payload").unwrap();

        let mut buffer = CopyBuffer::new();
        copy_file_exclusive(&source, &dest, &mut buffer).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");

        let err = copy_file_exclusive(&source, &dest, &mut buffer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_copy_file_exclusive_missing_source() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        let mut buffer = CopyBuffer::new();
        let err = copy_file_exclusive(&temp.path().join("none"), &dest, &mut buffer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!dest.exists());
    }
}
