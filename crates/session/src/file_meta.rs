//! Per-file metadata and the `FileSource`/`FileSink` adapters a transfer
//! reads from or writes to (`spec.md` §3 `SourceFile`/`TargetFile`, §9
//! "model as a tagged variant").

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use archive::{ArchiveReader, ArchiveWriter, ManifestEntry};
use control::Record;

use crate::error::TrzszError;

/// Immutable once constructed (`spec.md` §3): everything the sender side
/// knows about a file or directory before the `NAME` frame is sent.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Absolute path on the sending side's filesystem.
    pub absolute_path: PathBuf,
    /// The name reported to the peer and used to derive the destination
    /// filename (never the absolute path, which may leak local layout).
    pub display_name: String,
    /// Whether this entry is a directory, streamed through [`archive`].
    pub is_dir: bool,
    /// Total byte count: the file's own size, or the cumulative size of
    /// every regular file an archived directory contains.
    pub size: u64,
    /// The directory manifest, populated by [`ArchiveWriter::entries`] when
    /// `is_dir` is true.
    pub sub_files: Option<Vec<ManifestEntry>>,
    /// A stable identifier distinguishing this entry in a multi-file batch;
    /// simplified to the display name itself since this engine has no
    /// separate archive-session numbering scheme.
    pub archive_id: Option<String>,
}

impl SourceFile {
    /// Builds a [`SourceFile`] from a path on disk, walking it with
    /// [`ArchiveWriter`] first if it names a directory so `size` and
    /// `sub_files` are known before the `NAME` frame is sent.
    ///
    /// # Errors
    ///
    /// Returns [`TrzszError::Io`] if `path` can't be inspected, or an
    /// [`TrzszError`] converted from [`archive::ArchiveError`] if the
    /// directory walk fails.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrzszError> {
        let absolute_path = path.as_ref().to_path_buf();
        let display_name = absolute_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = std::fs::metadata(&absolute_path)?;

        if metadata.is_dir() {
            let writer = ArchiveWriter::new(&absolute_path)?;
            return Ok(Self {
                archive_id: Some(display_name.clone()),
                display_name,
                is_dir: true,
                size: writer.total_size(),
                sub_files: Some(writer.entries().to_vec()),
                absolute_path,
            });
        }

        Ok(Self {
            display_name,
            is_dir: false,
            size: metadata.len(),
            sub_files: None,
            archive_id: None,
            absolute_path,
        })
    }

    /// Renders this file's metadata as a `NAME` frame's payload. The
    /// manifest itself is not inlined here: the receiver re-derives
    /// `sub_files` from the archive stream as it arrives, so only the
    /// cumulative size and directory flag need to cross the wire up front.
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record::builder()
            .with("name", &self.display_name)
            .with("size", self.size)
            .with("dir", self.is_dir)
    }

    /// Opens the [`FileSource`] this entry reads from.
    ///
    /// # Errors
    ///
    /// Returns [`TrzszError::Io`] if the underlying file can't be opened, or
    /// the converted [`archive::ArchiveError`] if the directory walk fails.
    pub fn open(&self) -> Result<FileSource, TrzszError> {
        if self.is_dir {
            Ok(FileSource::Archive(ArchiveWriter::new(&self.absolute_path)?))
        } else {
            Ok(FileSource::Plain(File::open(&self.absolute_path)?))
        }
    }
}

/// Created by the receiver after name negotiation; immutable thereafter
/// within the file iteration (`spec.md` §3).
#[derive(Clone, Debug)]
pub struct TargetFile {
    /// The local path this entry will be (or has been) written to.
    pub resolved_name: PathBuf,
    /// Current on-disk size, used to decide whether the resume walk runs.
    pub existing_size: u64,
    /// Whether the `NAME` frame reported this entry as a directory.
    pub is_dir: bool,
}

impl TargetFile {
    /// Resolves a `NAME` frame's payload against `dest_dir`, reading
    /// whatever already exists there so the session can decide whether to
    /// run the resume walk (`spec.md` §4.6 "`Name → Resume?`").
    ///
    /// # Errors
    ///
    /// Returns [`control::RecordError`] wrapped as [`TrzszError`] if the
    /// record is missing a required field.
    pub fn from_record(record: &Record, dest_dir: impl AsRef<Path>) -> Result<Self, TrzszError> {
        let name: String = record.field("name")?.to_string();
        let is_dir = record.bool_or_false("dir")?;
        let resolved_name = dest_dir.as_ref().join(&name);
        let existing_size = if is_dir {
            0
        } else {
            std::fs::metadata(&resolved_name).map(|m| m.len()).unwrap_or(0)
        };
        Ok(Self {
            resolved_name,
            existing_size,
            is_dir,
        })
    }

    /// Opens the [`FileSink`] this entry writes to. For a regular file this
    /// opens (without truncating) so the resume walk can inspect the
    /// existing prefix before the data plane overwrites anything past it.
    ///
    /// # Errors
    ///
    /// Returns [`TrzszError::Io`] if the file can't be created/opened, or
    /// the converted [`archive::ArchiveError`] if the destination directory
    /// can't be prepared.
    pub fn open(&self) -> Result<FileSink, TrzszError> {
        if self.is_dir {
            Ok(FileSink::Archive(ArchiveReader::new(&self.resolved_name)?))
        } else {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.resolved_name)?;
            Ok(FileSink::Plain(file))
        }
    }
}

/// The sender's two cases of "something to read file-data from"
/// (`spec.md` §9: "tagged variant with... cases"; the third case, a bare
/// directory sentinel with no data at all, does not apply here since an
/// archived directory always has a byte stream — its manifest — to read).
pub enum FileSource {
    /// A single regular file, read directly.
    Plain(File),
    /// A directory, streamed through its archive manifest.
    Archive(ArchiveWriter),
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileSource::Plain(file) => file.read(buf),
            FileSource::Archive(writer) => writer.read(buf),
        }
    }
}

/// The receiver's mirror of [`FileSource`].
pub enum FileSink {
    /// A single regular file, written directly.
    Plain(File),
    /// A directory, rebuilt from its incoming archive manifest.
    Archive(ArchiveReader),
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Plain(file) => file.write(buf),
            FileSink::Archive(reader) => reader.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::Plain(file) => file.flush(),
            FileSink::Archive(reader) => reader.flush(),
        }
    }
}
