//! Slot File
//!
//! Byte-addressable access to the store file in whole-slot units.
//!
//! ## Responsibilities
//! - Create the file on first use
//! - Reject files whose length is not slot-aligned
//! - Read, overwrite and append single slots
//! - Replace the whole file atomically when it has to shrink

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, SlotError};
use crate::slot::{check_slot_size, RawSlot};

/// An open store file, validated to hold a whole number of slots
pub struct SlotFile {
    file: File,
    path: PathBuf,
    slot_size: usize,
    len: u64,
}

impl SlotFile {
    /// Open (creating if absent) and validate alignment
    pub fn open(path: &Path, slot_size: usize) -> Result<Self> {
        check_slot_size(slot_size)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let len = file.metadata()?.len();
        if len % slot_size as u64 != 0 {
            warn!(path = %path.display(), len, slot_size, "store file is not slot-aligned");
            return Err(SlotError::Misaligned { len, slot_size });
        }

        debug!(path = %path.display(), len, slots = len / slot_size as u64, "opened store file");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            slot_size,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn slot_count(&self) -> usize {
        (self.len / self.slot_size as u64) as usize
    }

    /// Byte offset of slot `index`
    pub fn offset_of(&self, index: usize) -> u64 {
        index as u64 * self.slot_size as u64
    }

    /// Read slot `index` into `buf` (which must be one slot long)
    pub fn read_slot(&mut self, index: usize, buf: &mut [u8]) -> Result<()> {
        let offset = self.offset_of(index);
        self.file.seek(SeekFrom::Start(offset))?;
        read_full(&mut self.file, buf, offset)
    }

    /// Overwrite slot `index` in place
    pub fn write_slot(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        debug_assert_eq!(bytes.len(), self.slot_size);
        let offset = self.offset_of(index);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Append a slot at end-of-file, returning its index
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        debug_assert_eq!(bytes.len(), self.slot_size);
        let index = self.slot_count();
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(index)
    }

    /// Visit slots front-to-back until `visit` returns `Some`
    ///
    /// Uses one reusable buffer; the `RawSlot` handed to `visit` only lives
    /// for the duration of the call.
    pub fn scan<T, F>(&mut self, mut visit: F) -> Result<Option<T>>
    where
        F: FnMut(usize, RawSlot<'_>) -> Result<Option<T>>,
    {
        let count = self.slot_count();
        let slot_size = self.slot_size;

        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        let mut buf = vec![0u8; slot_size];

        for index in 0..count {
            let offset = index as u64 * slot_size as u64;
            read_full(&mut reader, &mut buf, offset)?;
            if let Some(found) = visit(index, RawSlot::new(&buf, offset)?)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Read the entire file (always a whole number of slots)
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.len as usize];
        self.file.seek(SeekFrom::Start(0))?;
        read_full(&mut self.file, &mut buf, 0)?;
        Ok(buf)
    }

    /// Push written bytes out; `sync` additionally fsyncs the data
    pub fn flush(&mut self, sync: bool) -> Result<()> {
        self.file.flush()?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// `read_exact`, but an early EOF is reported as a truncated slot
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8], offset: u64) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            warn!(offset, "short read while scanning store file");
            Err(SlotError::ShortRead { offset })
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Atomic Replace
// =============================================================================

/// Sibling path used while rewriting: "uota.kv" -> "uota.kv.tmp"
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("store"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the file at `path` with `contents` in one rename
///
/// 1. Resolve `path` through any symlinks to the real store file
/// 2. Write contents to `<real>.tmp` with the original file's permissions
/// 3. fsync the temp file
/// 4. Rename over the original
/// 5. fsync the parent directory so the rename itself is durable
///
/// A crash at any point leaves either the old file or the new one. On any
/// error the temp file is removed. A failed directory fsync is logged, and
/// returned as an error when `strict` is set.
pub fn replace_atomically(path: &Path, contents: &[u8], strict: bool) -> Result<()> {
    let (target, permissions) = resolve_target(path)?;
    let tmp_path = temp_path(&target);

    let written = (|| -> io::Result<()> {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        if let Some(permissions) = permissions {
            tmp.set_permissions(permissions)?;
        }
        tmp.write_all(contents)?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &target)
    })();

    if let Err(e) = written {
        warn!(path = %tmp_path.display(), error = %e, "replace failed; removing temp file");
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    if let Err(e) = sync_parent_dir(&target) {
        warn!(path = %target.display(), error = %e, "directory fsync failed after rename");
        if strict {
            return Err(e.into());
        }
    }

    debug!(path = %target.display(), len = contents.len(), "replaced store file");
    Ok(())
}

/// The real file behind `path` and its permissions, if it exists yet
fn resolve_target(path: &Path) -> Result<(PathBuf, Option<Permissions>)> {
    match fs::canonicalize(path) {
        Ok(target) => {
            let permissions = fs::metadata(&target)?.permissions();
            Ok((target, Some(permissions)))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((path.to_path_buf(), None)),
        Err(e) => Err(e.into()),
    }
}

/// fsync the directory holding `path`
#[cfg(unix)]
pub fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
pub fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
