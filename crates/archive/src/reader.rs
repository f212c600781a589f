//! Replays an archive stream (as produced by [`crate::writer::ArchiveWriter`])
//! onto a destination directory, incrementally as bytes arrive through a
//! [`std::io::Write`] sink (`spec.md` §4.7 "Archive reader").

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::ArchiveError;
use crate::manifest::ManifestEntry;

enum Stage {
    AwaitingManifest,
    WritingBody { file: File, remaining: u64 },
}

/// Incrementally rebuilds a directory tree under `dest_root` from an
/// archive byte stream pushed through [`Write::write`].
pub struct ArchiveReader {
    dest_root: PathBuf,
    pending: Vec<u8>,
    stage: Stage,
    files_written: usize,
}

impl ArchiveReader {
    /// Prepares to replay an archive stream under `dest_root`, which is
    /// created if it doesn't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if `dest_root` can't be created.
    pub fn new(dest_root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dest_root = dest_root.into();
        fs::create_dir_all(&dest_root)?;
        Ok(Self {
            dest_root,
            pending: Vec::new(),
            stage: Stage::AwaitingManifest,
            files_written: 0,
        })
    }

    /// Number of regular files materialized so far.
    #[must_use]
    pub fn files_written(&self) -> usize {
        self.files_written
    }

    /// Resolves a manifest entry's relative path against `dest_root`,
    /// rejecting any path that would escape it.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::PathEscape`] if `relative_path` contains a
    /// `..` component, or is absolute.
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, ArchiveError> {
        let candidate = Path::new(relative_path);
        let escapes = candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
            || candidate.is_absolute();
        if escapes {
            return Err(ArchiveError::PathEscape(relative_path.to_string()));
        }
        Ok(self.dest_root.join(candidate))
    }

    fn begin_entry(&mut self, line: &str) -> Result<(), ArchiveError> {
        let entry = ManifestEntry::parse_line(line)?;
        let target = self.resolve(&entry.relative_path)?;
        if entry.is_dir {
            fs::create_dir_all(&target)?;
            self.stage = Stage::AwaitingManifest;
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&target)?;
        self.files_written += 1;
        self.stage = if entry.size == 0 {
            Stage::AwaitingManifest
        } else {
            Stage::WritingBody {
                file,
                remaining: entry.size,
            }
        };
        Ok(())
    }

    fn drive(&mut self) -> Result<(), ArchiveError> {
        loop {
            match &mut self.stage {
                Stage::AwaitingManifest => {
                    let Some(newline) = memchr::memchr(b'\n', &self.pending) else {
                        return Ok(());
                    };
                    let line: Vec<u8> = self.pending.drain(..=newline).collect();
                    let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                    self.begin_entry(&line)?;
                }
                Stage::WritingBody { file, remaining } => {
                    if self.pending.is_empty() {
                        return Ok(());
                    }
                    let take = usize::try_from(*remaining).unwrap_or(usize::MAX).min(self.pending.len());
                    let chunk: Vec<u8> = self.pending.drain(..take).collect();
                    file.write_all(&chunk)?;
                    *remaining -= take as u64;
                    if *remaining == 0 {
                        self.stage = Stage::AwaitingManifest;
                    }
                }
            }
        }
    }
}

impl Write for ArchiveReader {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drive().map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
