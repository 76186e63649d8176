//! RAR5 block header listing.
//!
//! Walks the block headers of a RAR5 archive without decoding any data, so
//! every record name can be checked before the decoder writes anything.
//! Header CRCs are verified; data areas are skipped by seeking.

use std::fs::File;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;

use crate::error::ArchiveError;

const RAR5_SIGNATURE: [u8; 8] = *b"Rar!\x1a\x07\x01\x00";
const RAR4_SIGNATURE: [u8; 7] = *b"Rar!\x1a\x07\x00";

/// Upper bound of a single header, as fixed by the RAR5 format.
const MAX_HEADER_SIZE: u64 = 2 * 1024 * 1024;

const HEADER_MAIN: u64 = 1;
const HEADER_FILE: u64 = 2;
const HEADER_SERVICE: u64 = 3;
const HEADER_ENCRYPTION: u64 = 4;
const HEADER_END: u64 = 5;

const FLAG_EXTRA_AREA: u64 = 0x01;
const FLAG_DATA_AREA: u64 = 0x02;
const FLAG_DATA_PREV: u64 = 0x08;
const FLAG_DATA_NEXT: u64 = 0x10;

const ARCHIVE_VOLUME: u64 = 0x01;
const ARCHIVE_VOLUME_NUMBER: u64 = 0x02;
const ARCHIVE_SOLID: u64 = 0x04;

const FILE_DIRECTORY: u64 = 0x01;
const FILE_MTIME: u64 = 0x02;
const FILE_CRC: u64 = 0x04;

const EXTRA_ENCRYPTION: u64 = 0x01;
const EXTRA_REDIRECTION: u64 = 0x05;

/// Name of the quick-open service record; the decoder stops at it.
const QUICK_OPEN: &str = "QO";

/// What a listed record turns into on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RecordKind {
    /// Regular file with a stored data area.
    File,
    /// Symlink or hard link; decoded as a plain file, never handed out.
    Link,
    /// Archive metadata (comments, ACLs); decoded but never handed out.
    Service,
}

/// One file or service record, in archive order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RarRecord {
    /// Name exactly as stored.
    pub name: PathBuf,
    /// How the record is treated.
    pub kind: RecordKind,
}

/// Lists every record the decoder would write.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for archives the decoder cannot reproduce
/// faithfully (RAR 4.x, volumes, solid or compressed data, encryption,
/// directory records) and `InvalidArchive` for damaged headers.
pub(super) fn list_records(path: &Path) -> Result<Vec<RarRecord>, ArchiveError> {
    let mut reader = BufReader::new(File::open(path)?);
    let unsupported = |reason: &str| ArchiveError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut signature = [0u8; 8];
    read_exact_or_truncated(&mut reader, &mut signature)?;
    if signature.starts_with(&RAR4_SIGNATURE) {
        return Err(unsupported("RAR 4.x archive"));
    }
    if signature != RAR5_SIGNATURE {
        return Err(ArchiveError::InvalidArchive("missing RAR5 signature".into()));
    }

    let mut records = Vec::new();
    loop {
        let header = read_header(&mut reader)?;
        let mut fields = Fields::new(&header.body);
        let kind = fields.vint()?;
        let flags = fields.vint()?;
        let extra_size = if flags & FLAG_EXTRA_AREA != 0 {
            fields.vint()?
        } else {
            0
        };
        let data_size = if flags & FLAG_DATA_AREA != 0 {
            fields.vint()?
        } else {
            0
        };
        if flags & (FLAG_DATA_PREV | FLAG_DATA_NEXT) != 0 {
            return Err(unsupported("multi-volume archive"));
        }

        match kind {
            HEADER_MAIN => {
                let archive_flags = fields.vint()?;
                if archive_flags & (ARCHIVE_VOLUME | ARCHIVE_VOLUME_NUMBER) != 0 {
                    return Err(unsupported("multi-volume archive"));
                }
                if archive_flags & ARCHIVE_SOLID != 0 {
                    return Err(unsupported("solid archive"));
                }
            }
            HEADER_FILE | HEADER_SERVICE => {
                let entry = FileFields::parse(&mut fields, &header.body, extra_size)?;
                if entry.encrypted {
                    return Err(unsupported("encrypted entry"));
                }
                if entry.method != 0 {
                    return Err(unsupported("compressed entries; only stored RAR data can be decoded"));
                }
                let service = kind == HEADER_SERVICE;
                if service && entry.name == QUICK_OPEN {
                    break;
                }
                if !service && entry.directory {
                    return Err(unsupported("directory records"));
                }

                let record_kind = if service {
                    RecordKind::Service
                } else if entry.redirected {
                    RecordKind::Link
                } else {
                    RecordKind::File
                };
                records.push(RarRecord {
                    name: PathBuf::from(entry.name),
                    kind: record_kind,
                });
            }
            HEADER_ENCRYPTION => return Err(unsupported("encrypted headers")),
            HEADER_END => break,
            _ => {}
        }

        skip_data(&mut reader, data_size)?;
    }
    Ok(records)
}

struct RawHeader {
    body: Vec<u8>,
}

fn read_header(reader: &mut impl Read) -> Result<RawHeader, ArchiveError> {
    let mut crc = [0u8; 4];
    read_exact_or_truncated(reader, &mut crc)?;

    let mut size_bytes = Vec::with_capacity(3);
    let size = read_vint(reader, &mut size_bytes)?;
    if size == 0 || size > MAX_HEADER_SIZE {
        return Err(ArchiveError::InvalidArchive(format!(
            "RAR header size {size} out of range"
        )));
    }

    let mut body = vec![0u8; usize::try_from(size).unwrap_or(usize::MAX)];
    read_exact_or_truncated(reader, &mut body)?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&size_bytes);
    hasher.update(&body);
    if hasher.finalize() != u32::from_le_bytes(crc) {
        return Err(ArchiveError::InvalidArchive("RAR header checksum mismatch".into()));
    }
    Ok(RawHeader { body })
}

fn skip_data<R: Read + Seek>(reader: &mut R, size: u64) -> Result<(), ArchiveError> {
    if size == 0 {
        return Ok(());
    }
    let offset = i64::try_from(size)
        .map_err(|_| ArchiveError::InvalidArchive("RAR data area too large".into()))?;
    reader.seek_relative(offset)?;
    Ok(())
}

fn read_exact_or_truncated(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), ArchiveError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            ArchiveError::InvalidArchive("truncated RAR archive".into())
        } else {
            ArchiveError::Io(err)
        }
    })
}

/// Reads a variable-length integer from a stream, keeping its raw bytes.
fn read_vint(reader: &mut impl Read, raw: &mut Vec<u8>) -> Result<u64, ArchiveError> {
    let mut value = 0u64;
    for shift in (0..70).step_by(7) {
        let mut byte = [0u8; 1];
        read_exact_or_truncated(reader, &mut byte)?;
        raw.push(byte[0]);
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ArchiveError::InvalidArchive("RAR integer too long".into()))
}

/// Cursor over the bytes of one header.
struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn truncated() -> ArchiveError {
        ArchiveError::InvalidArchive("truncated RAR header".into())
    }

    fn vint(&mut self) -> Result<u64, ArchiveError> {
        let mut value = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = *self.data.get(self.pos).ok_or_else(Self::truncated)?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ArchiveError::InvalidArchive("RAR integer too long".into()))
    }

    fn bytes(&mut self, len: u64) -> Result<&'a [u8], ArchiveError> {
        let len = usize::try_from(len).map_err(|_| Self::truncated())?;
        let end = self.pos.checked_add(len).ok_or_else(Self::truncated)?;
        let slice = self.data.get(self.pos..end).ok_or_else(Self::truncated)?;
        self.pos = end;
        Ok(slice)
    }
}

/// The parts of a file or service header that decide how it is handled.
struct FileFields {
    name: String,
    directory: bool,
    method: u64,
    encrypted: bool,
    redirected: bool,
}

impl FileFields {
    fn parse(fields: &mut Fields<'_>, body: &[u8], extra_size: u64) -> Result<Self, ArchiveError> {
        let file_flags = fields.vint()?;
        let _unpacked_size = fields.vint()?;
        let _attributes = fields.vint()?;
        if file_flags & FILE_MTIME != 0 {
            fields.bytes(4)?;
        }
        if file_flags & FILE_CRC != 0 {
            fields.bytes(4)?;
        }
        let compression = fields.vint()?;
        let _host_os = fields.vint()?;
        let name_len = fields.vint()?;
        let name = std::str::from_utf8(fields.bytes(name_len)?)
            .map_err(|_| ArchiveError::InvalidArchive("RAR entry name is not UTF-8".into()))?
            .to_string();

        // the extra area sits at the end of the header
        let extra_len = usize::try_from(extra_size).map_err(|_| Fields::truncated())?;
        let extra_start = body.len().checked_sub(extra_len).ok_or_else(Fields::truncated)?;
        let (encrypted, redirected) = scan_extra(&body[extra_start..])?;

        Ok(Self {
            name,
            directory: file_flags & FILE_DIRECTORY != 0,
            method: (compression >> 7) & 0x07,
            encrypted,
            redirected,
        })
    }
}

/// Returns `(encrypted, redirected)` for a file header's extra area.
fn scan_extra(extra: &[u8]) -> Result<(bool, bool), ArchiveError> {
    let mut fields = Fields::new(extra);
    let mut encrypted = false;
    let mut redirected = false;
    while fields.pos < extra.len() {
        let size = fields.vint()?;
        let record_start = fields.pos;
        let kind = fields.vint()?;
        encrypted |= kind == EXTRA_ENCRYPTION;
        redirected |= kind == EXTRA_REDIRECTION;
        fields.pos = record_start;
        fields.bytes(size)?;
    }
    Ok((encrypted, redirected))
}
