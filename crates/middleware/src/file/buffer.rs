use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use brx_metadata::BufferConfig;
use bytes::Bytes;

use super::frame::{frame_len, read_frames, write_frame, FLAG_REQUEUED, FRAME_HEADER_SIZE};
use super::offset::{Cursor, OffsetLog};
use crate::buffer::{BufferEntry, ReplayCallback, ReplayStats, RetryBuffer};
use crate::error::BufferError;

const OFFSET_FILE: &str = "offset.log";
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

fn segment_path(dir: &Path, segment: u64) -> PathBuf {
    dir.join(format!("data-{:010}.buf", segment))
}

fn parse_segment(name: &str) -> Option<u64> {
    name.strip_prefix("data-")?.strip_suffix(".buf")?.parse().ok()
}

fn list_segments(dir: &Path) -> Result<Vec<u64>, BufferError> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(n) = entry.file_name().to_str().and_then(parse_segment) {
            segments.push(n);
        }
    }
    segments.sort_unstable();
    Ok(segments)
}

fn read_segment(dir: &Path, segment: u64) -> Result<Bytes, BufferError> {
    Ok(Bytes::from(fs::read(segment_path(dir, segment))?))
}

struct Inner {
    writer: BufWriter<File>,
    write_segment: u64,
    write_position: u64,
    read: Cursor,
    offsets: OffsetLog,
    pending: u64,
    /// Evicted since the last replay pass
    evicted: u64,
}

/// State touched from the blocking pool
struct Shared {
    dir: PathBuf,
    max_segment_size: u64,
    max_segments: usize,
    /// Eviction waits while a pass holds entries from the oldest segment
    replaying: AtomicBool,
    inner: Mutex<Inner>,
}

/// Durable retry buffer over rotating segment files.
///
/// Appends go to the newest segment and are flushed before returning. The
/// read cursor is committed to the offset log after each segment of a replay
/// pass, so a crash re-delivers at most one segment's worth of entries.
///
/// File I/O runs on the blocking pool. Replay callbacks run on the calling
/// task between segment reads, and appends may interleave with a pass.
pub struct FileBuffer {
    shared: Arc<Shared>,
    /// One replay pass at a time
    pass: tokio::sync::Mutex<()>,
}

impl FileBuffer {
    /// Open or create the buffer. Any failure here is fatal for the caller.
    pub fn open(config: &BufferConfig) -> Result<Self, BufferError> {
        let dir = config.path.clone();
        let open_err = |e: std::io::Error| BufferError::Open {
            path: dir.clone(),
            reason: e.to_string(),
        };

        if config.clean_when_restart && dir.exists() {
            fs::remove_dir_all(&dir).map_err(open_err)?;
            tracing::info!(path = %dir.display(), "Discarded retry buffer backlog");
        }
        fs::create_dir_all(&dir).map_err(open_err)?;

        let (offsets, committed) =
            OffsetLog::open(&dir.join(OFFSET_FILE), config.offset_file_max_size)
                .map_err(open_err)?;

        let mut segments = list_segments(&dir)?;
        let first = segments.first().copied();
        let mut read = match (committed, first) {
            (Some(c), Some(first)) if c.segment < first => Cursor::new(first, 0),
            (Some(c), _) => c,
            (None, Some(first)) => Cursor::new(first, 0),
            (None, None) => Cursor::default(),
        };

        // Segments behind the cursor are already consumed
        for &seg in segments.iter().filter(|&&s| s < read.segment) {
            fs::remove_file(segment_path(&dir, seg)).map_err(open_err)?;
        }
        segments.retain(|&s| s >= read.segment);

        let write_segment = segments.last().copied().unwrap_or(read.segment);
        let path = segment_path(&dir, write_segment);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;

        let data = read_segment(&dir, write_segment)?;
        let (_, valid_end) = read_frames(&data, 0, data.len() as u64);
        if valid_end < data.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                torn_bytes = data.len() as u64 - valid_end,
                "Truncating torn frame at end of retry buffer segment"
            );
            file.set_len(valid_end).map_err(open_err)?;
        }

        if read.segment == write_segment && read.position > valid_end {
            read.position = valid_end;
        }

        let mut pending = 0u64;
        for seg in read.segment..=write_segment {
            if !segment_path(&dir, seg).exists() {
                continue;
            }
            let data = read_segment(&dir, seg)?;
            let from = if seg == read.segment { read.position } else { 0 };
            let (frames, _) = read_frames(&data, from, data.len() as u64);
            pending += frames.len() as u64;
        }

        tracing::info!(
            path = %dir.display(),
            read_segment = read.segment,
            write_segment,
            pending,
            "Opened retry buffer"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                dir,
                max_segment_size: config.data_file_max_size,
                max_segments: config.max_data_files,
                replaying: AtomicBool::new(false),
                inner: Mutex::new(Inner {
                    writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
                    write_segment,
                    write_position: valid_end,
                    read,
                    offsets,
                    pending,
                    evicted: 0,
                }),
            }),
            pass: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.dir
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, BufferError>
    where
        F: FnOnce(&Shared) -> Result<T, BufferError> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || f(&shared))
            .await
            .map_err(|e| BufferError::Task(e.to_string()))?
    }

    async fn replay_range(
        &self,
        start: Cursor,
        end: Cursor,
        callback: ReplayCallback<'_>,
        stats: &mut ReplayStats,
    ) -> Result<(), BufferError> {
        for seg in start.segment..=end.segment {
            let from = if seg == start.segment { start.position } else { 0 };
            let data = self
                .run_blocking(move |s| s.read_segment_or_empty(seg))
                .await?;
            let last = seg == end.segment;
            let to = if last { end.position } else { data.len() as u64 };
            let (frames, _) = read_frames(&data, from, to);

            let consumed = frames.len() as u64;
            let mut kept = Vec::new();
            for frame in frames {
                stats.delivered += 1;
                let entry = BufferEntry {
                    sequence: self.shared.sequence_of(seg, frame.position),
                    payload: frame.payload,
                };
                if callback(&entry) {
                    stats.handled += 1;
                } else {
                    stats.pending += 1;
                    kept.push(entry.payload);
                }
            }

            self.run_blocking(move |s| s.finish_segment(seg, last, to, consumed, kept))
                .await?;
        }
        Ok(())
    }
}

/// Clears the replaying flag even when a pass is abandoned midway
struct PassGuard<'a>(&'a Shared);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.replaying.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sequence_of(&self, segment: u64, position: u64) -> u64 {
        segment * self.max_segment_size + position
    }

    fn append(&self, payload: &[u8]) -> Result<u64, BufferError> {
        let mut inner = self.lock();
        self.append_locked(&mut inner, payload, 0)
    }

    fn append_locked(
        &self,
        inner: &mut Inner,
        payload: &[u8],
        flags: u32,
    ) -> Result<u64, BufferError> {
        let len = frame_len(payload.len());
        if len > self.max_segment_size {
            return Err(BufferError::EntryTooLarge {
                len: payload.len() + FRAME_HEADER_SIZE,
                max: self.max_segment_size,
            });
        }
        if inner.write_position > 0 && inner.write_position + len > self.max_segment_size {
            self.rotate(inner)?;
        }

        let sequence = self.sequence_of(inner.write_segment, inner.write_position);
        write_frame(&mut inner.writer, payload, flags)?;
        inner.writer.flush()?;
        inner.write_position += len;
        inner.pending += 1;
        Ok(sequence)
    }

    fn rotate(&self, inner: &mut Inner) -> Result<(), BufferError> {
        inner.writer.flush()?;
        inner.writer.get_ref().sync_data()?;

        let next = inner.write_segment + 1;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(&self.dir, next))?;
        inner.writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        inner.write_segment = next;
        inner.write_position = 0;
        tracing::debug!(segment = next, path = %self.dir.display(), "Rotated retry buffer segment");

        if !self.replaying.load(Ordering::SeqCst) {
            self.evict(inner)?;
        }
        Ok(())
    }

    fn evict(&self, inner: &mut Inner) -> Result<(), BufferError> {
        while (inner.write_segment - inner.read.segment + 1) as usize > self.max_segments {
            let seg = inner.read.segment;
            let path = segment_path(&self.dir, seg);
            let lost = match fs::read(&path) {
                Ok(data) => {
                    let data = Bytes::from(data);
                    read_frames(&data, inner.read.position, data.len() as u64).0.len() as u64
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => return Err(e.into()),
            };
            if path.exists() {
                fs::remove_file(&path)?;
            }
            inner.read = Cursor::new(seg + 1, 0);
            inner.offsets.commit(inner.read)?;
            inner.pending = inner.pending.saturating_sub(lost);
            inner.evicted += lost;
            tracing::warn!(
                segment = seg,
                entries = lost,
                path = %self.dir.display(),
                "Evicted unreplayed retry buffer segment"
            );
        }
        Ok(())
    }

    fn evict_after_pass(&self) -> Result<(), BufferError> {
        let mut inner = self.lock();
        self.evict(&mut inner)
    }

    /// Range covered by a pass, plus evictions since the last one
    fn begin_pass(&self) -> Result<(Cursor, Cursor, u64), BufferError> {
        let mut inner = self.lock();
        inner.writer.flush()?;
        let start = inner.read;
        let end = Cursor::new(inner.write_segment, inner.write_position);
        Ok((start, end, std::mem::take(&mut inner.evicted)))
    }

    fn read_segment_or_empty(&self, segment: u64) -> Result<Bytes, BufferError> {
        match read_segment(&self.dir, segment) {
            Err(BufferError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Bytes::new())
            }
            other => other,
        }
    }

    fn finish_segment(
        &self,
        segment: u64,
        last: bool,
        to: u64,
        consumed: u64,
        kept: Vec<Bytes>,
    ) -> Result<(), BufferError> {
        let mut inner = self.lock();
        inner.pending = inner.pending.saturating_sub(consumed);

        // Re-queue before moving the cursor so a crash duplicates rather than loses
        for payload in &kept {
            self.append_locked(&mut inner, payload, FLAG_REQUEUED)?;
        }
        if !kept.is_empty() {
            inner.writer.flush()?;
            inner.writer.get_ref().sync_data()?;
        }

        if last {
            inner.read = Cursor::new(segment, to);
        } else {
            let path = segment_path(&self.dir, segment);
            if path.exists() {
                fs::remove_file(&path)?;
            }
            inner.read = Cursor::new(segment + 1, 0);
        }
        let read = inner.read;
        inner.offsets.commit(read)?;
        Ok(())
    }
}

#[async_trait]
impl RetryBuffer for FileBuffer {
    async fn append(&self, payload: Bytes) -> Result<u64, BufferError> {
        self.run_blocking(move |s| s.append(&payload)).await
    }

    async fn replay(&self, callback: ReplayCallback<'_>) -> Result<ReplayStats, BufferError> {
        let _pass = self.pass.lock().await;
        self.shared.replaying.store(true, Ordering::SeqCst);
        let replaying = PassGuard(&self.shared);
        let (start, end, evicted) = self.run_blocking(Shared::begin_pass).await?;

        let mut stats = ReplayStats {
            evicted,
            ..Default::default()
        };
        self.replay_range(start, end, callback, &mut stats).await?;

        drop(replaying);
        self.run_blocking(Shared::evict_after_pass).await?;
        Ok(stats)
    }

    async fn pending(&self) -> Result<u64, BufferError> {
        self.run_blocking(|s| Ok(s.lock().pending)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> BufferConfig {
        BufferConfig::new(dir.path().join("perf"))
    }

    async fn drain(buffer: &FileBuffer) -> Vec<Bytes> {
        let mut seen = Vec::new();
        buffer
            .replay(&mut |e: &BufferEntry| {
                seen.push(e.payload.clone());
                true
            })
            .await
            .unwrap();
        seen
    }

    #[tokio::test]
    async fn test_append_then_replay_in_order() {
        let dir = TempDir::new().unwrap();
        let buffer = FileBuffer::open(&config(&dir)).unwrap();
        for p in ["one", "two", "three"] {
            buffer.append(Bytes::from(p)).await.unwrap();
        }
        assert_eq!(buffer.pending().await.unwrap(), 3);

        let seen = drain(&buffer).await;
        assert_eq!(seen, vec!["one", "two", "three"]);
        assert_eq!(buffer.pending().await.unwrap(), 0);
        assert!(drain(&buffer).await.is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_entry_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let buffer = FileBuffer::open(&config(&dir)).unwrap();
            buffer.append(Bytes::from("resolved")).await.unwrap();
            buffer.append(Bytes::from("unresolved")).await.unwrap();
            let stats = buffer
                .replay(&mut |e: &BufferEntry| e.payload == Bytes::from("resolved"))
                .await
                .unwrap();
            assert_eq!(stats.handled, 1);
            assert_eq!(stats.pending, 1);
        }

        let reopened = FileBuffer::open(&config(&dir)).unwrap();
        assert_eq!(reopened.pending().await.unwrap(), 1);
        assert_eq!(drain(&reopened).await, vec!["unresolved"]);
    }

    #[tokio::test]
    async fn test_unreplayed_entries_survive_restart() {
        let dir = TempDir::new().unwrap();
        {
            let buffer = FileBuffer::open(&config(&dir)).unwrap();
            buffer.append(Bytes::from("a")).await.unwrap();
            buffer.append(Bytes::from("b")).await.unwrap();
        }
        let reopened = FileBuffer::open(&config(&dir)).unwrap();
        assert_eq!(drain(&reopened).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_clean_when_restart_discards_backlog() {
        let dir = TempDir::new().unwrap();
        {
            let buffer = FileBuffer::open(&config(&dir)).unwrap();
            buffer.append(Bytes::from("stale")).await.unwrap();
        }
        let mut cfg = config(&dir);
        cfg.clean_when_restart = true;
        let reopened = FileBuffer::open(&cfg).unwrap();
        assert_eq!(reopened.pending().await.unwrap(), 0);
        assert!(drain(&reopened).await.is_empty());
    }

    #[tokio::test]
    async fn test_torn_tail_truncated_on_open() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        {
            let buffer = FileBuffer::open(&cfg).unwrap();
            buffer.append(Bytes::from("complete")).await.unwrap();
        }
        // Simulate a crash halfway through writing a frame
        {
            let mut f = OpenOptions::new()
                .append(true)
                .open(segment_path(&cfg.path, 0))
                .unwrap();
            f.write_all(&[200, 0, 0, 0, 0, 0, 0, 0, b'x']).unwrap();
        }

        let reopened = FileBuffer::open(&cfg).unwrap();
        assert_eq!(reopened.pending().await.unwrap(), 1);
        reopened.append(Bytes::from("after")).await.unwrap();
        assert_eq!(drain(&reopened).await, vec!["complete", "after"]);
    }

    #[tokio::test]
    async fn test_rotation_and_consumed_segment_cleanup() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.data_file_max_size = 64;
        let buffer = FileBuffer::open(&cfg).unwrap();

        // 8-byte header + 24-byte payload = 32 bytes, two per segment
        for i in 0..6 {
            buffer
                .append(Bytes::from(format!("{:024}", i)))
                .await
                .unwrap();
        }
        assert_eq!(list_segments(&cfg.path).unwrap(), vec![0, 1, 2]);

        let seen = drain(&buffer).await;
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[5], Bytes::from(format!("{:024}", 5)));
        assert_eq!(list_segments(&cfg.path).unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_eviction_drops_oldest_segment() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.data_file_max_size = 64;
        cfg.max_data_files = 2;
        let buffer = FileBuffer::open(&cfg).unwrap();

        for i in 0..6 {
            buffer
                .append(Bytes::from(format!("{:024}", i)))
                .await
                .unwrap();
        }
        assert_eq!(list_segments(&cfg.path).unwrap(), vec![1, 2]);
        assert_eq!(buffer.pending().await.unwrap(), 4);

        let mut seen = Vec::new();
        let stats = buffer
            .replay(&mut |e: &BufferEntry| {
                seen.push(e.payload.clone());
                true
            })
            .await
            .unwrap();
        assert_eq!(stats.evicted, 2);
        assert_eq!(seen[0], Bytes::from(format!("{:024}", 2)));
    }

    #[tokio::test]
    async fn test_entry_larger_than_segment_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.data_file_max_size = 16;
        let buffer = FileBuffer::open(&cfg).unwrap();
        let err = buffer
            .append(Bytes::from(vec![0u8; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, BufferError::EntryTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_requeued_entries_keep_arrival_order() {
        let dir = TempDir::new().unwrap();
        let buffer = FileBuffer::open(&config(&dir)).unwrap();
        for p in ["x", "y", "z"] {
            buffer.append(Bytes::from(p)).await.unwrap();
        }
        buffer.replay(&mut |_: &BufferEntry| false).await.unwrap();
        assert_eq!(buffer.pending().await.unwrap(), 3);
        assert_eq!(drain(&buffer).await, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_replay_pass_lets_other_tasks_run() {
        let dir = TempDir::new().unwrap();
        let buffer = FileBuffer::open(&config(&dir)).unwrap();
        buffer.append(Bytes::from("parked")).await.unwrap();

        // Current-thread runtime: the spawned task only runs once replay
        // hands its file work to the blocking pool and yields
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        let mut observed = Vec::new();
        buffer
            .replay(&mut |_: &BufferEntry| {
                observed.push(ran.load(Ordering::SeqCst));
                false
            })
            .await
            .unwrap();
        assert_eq!(observed, vec![true]);
    }

    #[tokio::test]
    async fn test_append_during_pass_waits_for_next_pass() {
        let dir = TempDir::new().unwrap();
        let buffer = Arc::new(FileBuffer::open(&config(&dir)).unwrap());
        buffer.append(Bytes::from("first")).await.unwrap();

        let writer = Arc::clone(&buffer);
        let mut late = None;
        let mut seen = Vec::new();
        buffer
            .replay(&mut |e: &BufferEntry| {
                seen.push(e.payload.clone());
                let writer = Arc::clone(&writer);
                late.get_or_insert_with(|| {
                    tokio::spawn(async move { writer.append(Bytes::from("late")).await })
                });
                true
            })
            .await
            .unwrap();
        late.unwrap().await.unwrap().unwrap();

        assert_eq!(seen, vec!["first"]);
        assert_eq!(drain(&buffer).await, vec!["late"]);
    }

    #[tokio::test]
    async fn test_abandoned_pass_does_not_block_eviction() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.data_file_max_size = 64;
        cfg.max_data_files = 2;
        let buffer = FileBuffer::open(&cfg).unwrap();
        buffer.append(Bytes::from(format!("{:024}", 0))).await.unwrap();

        {
            let mut noop = |_: &BufferEntry| true;
            let pass = buffer.replay(&mut noop);
            tokio::pin!(pass);
            // Start the pass, then drop it while it waits on the blocking pool
            let _ = futures_util::poll!(pass.as_mut());
        }

        for i in 1..6 {
            buffer
                .append(Bytes::from(format!("{:024}", i)))
                .await
                .unwrap();
        }
        assert_eq!(list_segments(&cfg.path).unwrap().len(), 2);
    }

    #[test]
    fn test_open_fails_on_unusable_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a dir").unwrap();
        let cfg = BufferConfig::new(blocker.join("buffer"));
        assert!(matches!(
            FileBuffer::open(&cfg),
            Err(BufferError::Open { .. })
        ));
    }
}
