use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Read position: segment number and byte offset within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Cursor {
    pub segment: u64,
    pub position: u64,
}

impl Cursor {
    pub fn new(segment: u64, position: u64) -> Self {
        Self { segment, position }
    }
}

/// Append-only cursor log. Each commit adds one "segment position" line;
/// the last complete line wins.
pub struct OffsetLog {
    path: PathBuf,
    file: File,
    size: u64,
    max_size: u64,
}

impl OffsetLog {
    pub fn open(path: &Path, max_size: u64) -> io::Result<(Self, Option<Cursor>)> {
        let cursor = match fs::read_to_string(path) {
            Ok(content) => last_cursor(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        let log = Self {
            path: path.to_path_buf(),
            file,
            size,
            max_size,
        };
        Ok((log, cursor))
    }

    pub fn commit(&mut self, cursor: Cursor) -> io::Result<()> {
        let line = format!("{} {}\n", cursor.segment, cursor.position);
        if self.size + line.len() as u64 > self.max_size {
            return self.compact(&line);
        }
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        self.size += line.len() as u64;
        Ok(())
    }

    /// Replace the log with a single line via write-then-rename
    fn compact(&mut self, line: &str) -> io::Result<()> {
        let tmp = self.path.with_extension("log.tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(line.as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.size = line.len() as u64;
        tracing::debug!(path = %self.path.display(), "Compacted offset log");
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A torn final line (no newline) is ignored
fn last_cursor(content: &str) -> Option<Cursor> {
    let complete = &content[..content.rfind('\n')?];
    complete
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let segment = parts.next()?.parse().ok()?;
            let position = parts.next()?.parse().ok()?;
            Some(Cursor::new(segment, position))
        })
        .last()
}
