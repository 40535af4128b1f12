//! Incremental tailing of a rotation-prone log file.
//!
//! A `Tailer` remembers how much of one file it has consumed (identity +
//! byte offset) and, on each poll, classifies the file as absent,
//! unchanged, rotated, or grown. Only complete newline-terminated lines
//! are ever consumed; a trailing partial line is left for a later poll.

use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Read cursor: stable file identity plus the next unread byte.
///
/// `identity` is `None` until the file has been observed once, so a
/// fresh cursor never mistakes the first observation for a rotation.
#[derive(Debug, Clone, Copy, Default)]
struct FileCursor {
    identity: Option<u64>,
    offset: u64,
}

/// Outcome of a single [`Tailer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// The file does not exist. No cursor change; retry later.
    Absent,
    /// Nothing new to consume. Covers both an untouched file and one
    /// that has grown by only a partial (unterminated) trailing line.
    Unchanged,
    /// The file was replaced or truncated. The cursor now points at the
    /// start of the new file; dependent state must be discarded before
    /// the next poll reprocesses it.
    Rotated,
    /// New complete lines were appended, returned in file order with
    /// line terminators stripped.
    Grown(Vec<String>),
}

/// Tracks one log file and yields newly appended lines across polls.
///
/// Rotation detection compares the file's identity (inode) and guards
/// against shrinkage. A replacement file that happens to keep the same
/// identity and byte size is indistinguishable from an untouched file
/// and is reported as `Unchanged`; this is a known limitation inherited
/// from the inode+size check.
#[derive(Debug)]
pub struct Tailer {
    path: PathBuf,
    cursor: FileCursor,
}

impl Tailer {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cursor: FileCursor::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The next unread byte offset.
    pub fn offset(&self) -> u64 {
        self.cursor.offset
    }

    /// Forget everything; the next poll starts from byte 0.
    pub fn reset(&mut self) {
        self.cursor = FileCursor::default();
    }

    /// Inspect the file and consume any newly appended complete lines.
    ///
    /// I/O errors are returned as-is and are non-fatal: the cursor has
    /// not advanced, so the caller can back off and poll again.
    pub fn poll(&mut self) -> io::Result<TailEvent> {
        let meta = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TailEvent::Absent),
            Err(e) => return Err(e),
        };

        let identity = file_identity(&meta);
        let size = meta.len();

        match self.cursor.identity {
            Some(known) if known != identity || size < self.cursor.offset => {
                self.cursor = FileCursor {
                    identity: Some(identity),
                    offset: 0,
                };
                return Ok(TailEvent::Rotated);
            }
            Some(_) => {}
            None => self.cursor.identity = Some(identity),
        }

        if size == self.cursor.offset {
            return Ok(TailEvent::Unchanged);
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.cursor.offset))?;
        let mut buf = Vec::with_capacity((size - self.cursor.offset) as usize);
        file.read_to_end(&mut buf)?;

        // Consume only up to the last newline; the remainder is a
        // partial line still being written.
        let complete = match buf.iter().rposition(|&b| b == b'\n') {
            Some(i) => i + 1,
            None => return Ok(TailEvent::Unchanged),
        };

        let mut lines = Vec::new();
        for raw in buf[..complete].split_inclusive(|&b| b == b'\n') {
            let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            lines.push(String::from_utf8_lossy(raw).into_owned());
        }

        self.cursor.offset += complete as u64;
        Ok(TailEvent::Grown(lines))
    }
}

#[cfg(unix)]
fn file_identity(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn file_identity(_meta: &Metadata) -> u64 {
    // No inode equivalent; rotation is detected by shrinkage only.
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, data: &str) {
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn test_absent_file() {
        let dir = TempDir::new().unwrap();
        let mut tailer = Tailer::new(dir.path().join("missing.log"));
        assert_eq!(tailer.poll().unwrap(), TailEvent::Absent);
        assert_eq!(tailer.offset(), 0);
    }

    #[test]
    fn test_grown_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.log");
        append(&path, "one\ntwo\n");

        let mut tailer = Tailer::new(&path);
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["one".to_string(), "two".to_string()])
        );
        assert_eq!(tailer.poll().unwrap(), TailEvent::Unchanged);

        append(&path, "three\n");
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["three".to_string()])
        );
    }

    #[test]
    fn test_partial_line_left_for_next_poll() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.log");
        append(&path, "complete\npart");

        let mut tailer = Tailer::new(&path);
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["complete".to_string()])
        );
        // Only an unterminated fragment remains.
        assert_eq!(tailer.poll().unwrap(), TailEvent::Unchanged);

        append(&path, "ial\n");
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["partial".to_string()])
        );
    }

    #[test]
    fn test_truncation_is_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.log");
        append(&path, "a\nb\nc\n");

        let mut tailer = Tailer::new(&path);
        assert!(matches!(tailer.poll().unwrap(), TailEvent::Grown(_)));

        fs::write(&path, "x\n").unwrap();
        assert_eq!(tailer.poll().unwrap(), TailEvent::Rotated);
        assert_eq!(tailer.offset(), 0);
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["x".to_string()])
        );
    }

    #[test]
    fn test_replacement_file_is_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.log");
        append(&path, "old line\n");

        let mut tailer = Tailer::new(&path);
        assert!(matches!(tailer.poll().unwrap(), TailEvent::Grown(_)));

        // Build the replacement while the original still exists so it
        // gets a distinct inode, then rename it over the top.
        let staged = dir.path().join("probe.log.new");
        fs::write(&staged, "new one\nnew two\n").unwrap();
        fs::rename(&staged, &path).unwrap();

        assert_eq!(tailer.poll().unwrap(), TailEvent::Rotated);
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["new one".to_string(), "new two".to_string()])
        );
    }

    #[test]
    fn test_reset_rereads_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.log");
        append(&path, "a\nb\n");

        let mut tailer = Tailer::new(&path);
        assert!(matches!(tailer.poll().unwrap(), TailEvent::Grown(_)));
        tailer.reset();
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_blank_lines_are_returned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.log");
        append(&path, "a\n\nb\n");

        let mut tailer = Tailer::new(&path);
        assert_eq!(
            tailer.poll().unwrap(),
            TailEvent::Grown(vec!["a".to_string(), String::new(), "b".to_string()])
        );
    }
}
