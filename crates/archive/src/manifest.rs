//! The manifest line that precedes each entry's body in an archive stream:
//! a [`control::Record`] naming the entry's relative path, byte size, and
//! whether it is a directory, terminated by `\n` (`spec.md` §4.7).
//!
//! A relative path may itself contain a `,`, which would otherwise be
//! ambiguous with [`control::Record`]'s field separator, so the `path`
//! field is percent-escaped before it is rendered.

use control::{Record, RecordError};

/// One manifest entry: a path relative to the archive root, its size in
/// bytes (`0` for directories), and whether it names a directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestEntry {
    pub relative_path: String,
    pub size: u64,
    pub is_dir: bool,
}

impl ManifestEntry {
    /// Renders this entry as a manifest line, including the trailing `\n`.
    #[must_use]
    pub fn render_line(&self) -> String {
        let record = Record::builder()
            .with("path", escape_path(&self.relative_path))
            .with("size", self.size)
            .with("dir", self.is_dir);
        let mut line = record.render();
        line.push('\n');
        line
    }

    /// Parses a manifest line (without its trailing `\n`) back into an entry.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the `path` or `size` field is missing or
    /// unparsable.
    pub fn parse_line(line: &str) -> Result<Self, RecordError> {
        let record = Record::parse(line);
        Ok(Self {
            relative_path: unescape_path(record.field("path")?),
            size: record.parsed("size")?,
            is_dir: record.bool_or_false("dir")?,
        })
    }
}

fn escape_path(path: &str) -> String {
    path.replace('%', "%25").replace(',', "%2C")
}

fn unescape_path(path: &str) -> String {
    path.replace("%2C", ",").replace("%25", "%")
}
