//! Turns a source directory into a single `Read` stream: a manifest line
//! per entry (in deterministic, sorted order) immediately followed by that
//! entry's raw bytes for regular files (`spec.md` §4.7 "Archive writer").

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::error::ArchiveError;
use crate::manifest::ManifestEntry;

struct QueuedEntry {
    entry: ManifestEntry,
    absolute_path: PathBuf,
}

enum Stage {
    /// Emitting a manifest line; `Some(path)` means a file body follows
    /// once the line is exhausted, `None` means the entry was a directory.
    Manifest(Cursor<Vec<u8>>, Option<PathBuf>),
    Body(File),
    Idle,
}

/// Adapts a source directory tree into one [`Read`] stream of manifest
/// lines interleaved with file bodies, in the same sorted order
/// [`crate::reader::ArchiveReader`] expects to replay them in.
pub struct ArchiveWriter {
    queue: VecDeque<QueuedEntry>,
    stage: Stage,
    entries: Vec<ManifestEntry>,
    file_count: usize,
    total_size: u64,
}

impl ArchiveWriter {
    /// Walks `root` and prepares to stream its manifest and contents.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Walk`] if the directory walk itself fails, or
    /// [`ArchiveError::Io`] if an entry's metadata can't be read.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let root = root.as_ref();
        let mut queue = VecDeque::new();
        let mut entries = Vec::new();
        let mut file_count = 0usize;
        let mut total_size = 0u64;

        for walked in WalkDir::new(root).sort(true).min_depth(1) {
            let walked = walked.map_err(|e| ArchiveError::Walk(e.to_string()))?;
            let absolute_path = walked.path();
            let is_dir = walked.file_type().is_dir();
            let size = if is_dir {
                0
            } else {
                walked.metadata().map_err(|e| ArchiveError::Walk(e.to_string()))?.len()
            };
            let relative_path = absolute_path
                .strip_prefix(root)
                .expect("jwalk yields only descendants of root")
                .to_string_lossy()
                .replace('\\', "/");

            if !is_dir {
                file_count += 1;
                total_size += size;
            }
            let entry = ManifestEntry {
                relative_path,
                size,
                is_dir,
            };
            entries.push(entry.clone());
            queue.push_back(QueuedEntry { entry, absolute_path });
        }

        logging::info_log!(
            Misc,
            2,
            "archive source {} contains {} files, {} bytes",
            root.display(),
            file_count,
            total_size
        );

        Ok(Self {
            queue,
            stage: Stage::Idle,
            entries,
            file_count,
            total_size,
        })
    }

    /// Number of regular files this archive will stream (directories
    /// aren't counted, matching `spec.md`'s per-file progress reporting).
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Sum of every regular file's size, in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// The full manifest, in the order it will be streamed, for a caller
    /// that needs to report a cumulative size before the transfer starts
    /// (`spec.md` §3 `SourceFile::sub_files`).
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    fn advance(&mut self) -> io::Result<()> {
        let Some(queued) = self.queue.pop_front() else {
            self.stage = Stage::Idle;
            return Ok(());
        };
        let line = queued.entry.render_line().into_bytes();
        let pending_body = if queued.entry.is_dir {
            None
        } else {
            Some(queued.absolute_path)
        };
        self.stage = Stage::Manifest(Cursor::new(line), pending_body);
        Ok(())
    }
}

impl Read for ArchiveWriter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match &mut self.stage {
                Stage::Idle => {
                    self.advance()?;
                    if matches!(self.stage, Stage::Idle) {
                        return Ok(0);
                    }
                }
                Stage::Manifest(cursor, pending_body) => {
                    let n = cursor.read(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    match pending_body.take() {
                        Some(path) => self.stage = Stage::Body(File::open(path)?),
                        None => self.stage = Stage::Idle,
                    }
                }
                Stage::Body(file) => {
                    let n = file.read(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    self.stage = Stage::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read as _;

    use super::*;

    #[test]
    fn streams_a_manifest_line_and_body_for_each_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"world").unwrap();

        let mut writer = ArchiveWriter::new(dir.path()).unwrap();
        assert_eq!(writer.file_count(), 2);
        assert_eq!(writer.total_size(), 10);

        let mut out = Vec::new();
        writer.read_to_end(&mut out).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        assert!(rendered.contains("path=a.txt,size=5,dir=false"));
        assert!(rendered.contains("path=sub,size=0,dir=true"));
        assert!(rendered.contains("path=sub/b.txt,size=5,dir=false"));
        assert!(rendered.contains("hello"));
        assert!(rendered.contains("world"));
    }

    #[test]
    fn walks_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"2").unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();

        let mut writer = ArchiveWriter::new(dir.path()).unwrap();
        let mut out = Vec::new();
        writer.read_to_end(&mut out).unwrap();
        let rendered = String::from_utf8_lossy(&out);
        let pos_a = rendered.find("path=a.txt").unwrap();
        let pos_b = rendered.find("path=b.txt").unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn empty_directory_produces_an_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArchiveWriter::new(dir.path()).unwrap();
        assert_eq!(writer.file_count(), 0);
        let mut out = Vec::new();
        writer.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
