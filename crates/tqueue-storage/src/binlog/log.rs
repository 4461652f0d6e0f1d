//! Append-only record log
//!
//! Each record is framed as `[u32 big-endian length][bytes]`. Opening a log
//! replays every complete record to the caller before new appends are
//! accepted. A torn final frame left by a crash is cut off; an impossible
//! length anywhere before that is treated as corruption.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use tqueue_core::StorageError;

const LEN_PREFIX: u64 = 4;
const MAX_FRAME_LEN: usize = u32::MAX as usize;

/// Configuration for a [`Binlog`]
#[derive(Debug, Clone)]
pub struct BinlogConfig {
    /// Whether to sync writes to disk immediately
    pub sync_on_write: bool,
    /// Largest accepted record body in bytes, at most `u32::MAX`
    pub max_record_size: usize,
}

impl Default for BinlogConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_record_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl BinlogConfig {
    /// Set whether every append is synced
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Set the largest accepted record body, clamped to what the length
    /// prefix can express
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size.min(MAX_FRAME_LEN);
        self
    }
}

/// Durable append-only log of opaque records
#[derive(Debug)]
pub struct Binlog {
    path: PathBuf,
    config: BinlogConfig,
    file: File,
    record_count: u64,
    size_bytes: u64,
    /// A failed append may have left bytes past `size_bytes`
    dirty: bool,
}

struct ScanOutcome {
    records: u64,
    valid_len: u64,
}

impl Binlog {
    /// Open or create the log at `path`, handing every stored record to `replay`
    ///
    /// Records are delivered in append order. If `replay` fails the log is
    /// not opened and its error is returned.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn init<P, F, E>(path: P, config: BinlogConfig, replay: F) -> Result<Self, E>
    where
        P: AsRef<Path>,
        F: FnMut(&[u8]) -> Result<(), E>,
        E: From<StorageError>,
    {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(StorageError::from)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(StorageError::from)?;
        let file_size = file.metadata().map_err(StorageError::from)?.len();

        info!(path = %path.display(), size = file_size, "Opening binlog");

        let outcome = scan(&file, file_size, config.max_record_size, replay)?;
        if outcome.valid_len < file_size {
            warn!(
                offset = outcome.valid_len,
                dropped = file_size - outcome.valid_len,
                "Truncating torn record at end of binlog"
            );
            file.set_len(outcome.valid_len).map_err(StorageError::from)?;
            file.sync_all().map_err(StorageError::from)?;
        }
        file.seek(SeekFrom::End(0)).map_err(StorageError::from)?;

        debug!(
            records = outcome.records,
            size = outcome.valid_len,
            "Binlog opened"
        );

        Ok(Self {
            path,
            config,
            file,
            record_count: outcome.records,
            size_bytes: outcome.valid_len,
            dirty: false,
        })
    }

    /// Append one record
    ///
    /// On error nothing of the record stays in the log: a partly written or
    /// unsynced frame is cut off before the error is returned, or before the
    /// next append if cutting it off failed too.
    pub fn append(&mut self, record: &[u8]) -> Result<(), StorageError> {
        let frame = self.frame(record)?;
        if self.dirty {
            self.discard_uncommitted()?;
        }

        let written = self.file.write_all(&frame).and_then(|()| {
            if self.config.sync_on_write {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            self.dirty = true;
            warn!(offset = self.size_bytes, error = %e, "Binlog append failed, discarding frame");
            if let Err(cleanup) = self.discard_uncommitted() {
                warn!(error = %cleanup, "Could not discard failed frame, retrying on next append");
            }
            return Err(e.into());
        }

        self.record_count += 1;
        self.size_bytes += frame.len() as u64;
        Ok(())
    }

    /// Cut the file back to the last committed frame
    fn discard_uncommitted(&mut self) -> Result<(), StorageError> {
        self.file.set_len(self.size_bytes)?;
        self.file.seek(SeekFrom::Start(self.size_bytes))?;
        self.file.sync_data()?;
        self.dirty = false;
        Ok(())
    }

    /// Read every stored record back, in append order
    pub fn for_each_record<F, E>(&self, f: F) -> Result<u64, E>
    where
        F: FnMut(&[u8]) -> Result<(), E>,
        E: From<StorageError>,
    {
        let file = File::open(&self.path).map_err(StorageError::from)?;
        let outcome = scan(&file, self.size_bytes, self.config.max_record_size, f)?;
        Ok(outcome.records)
    }

    /// Atomically replace the whole log with `records`
    ///
    /// The new contents are written and synced to a sibling file which then
    /// takes the place of the log.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn rewrite<I>(&mut self, records: I) -> Result<(), StorageError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let tmp_path = tmp_path(&self.path);
        let mut record_count = 0u64;
        let mut size_bytes = 0u64;
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for record in records {
                let frame = self.frame(record.as_ref())?;
                writer.write_all(&frame)?;
                record_count += 1;
                size_bytes += frame.len() as u64;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.seek(SeekFrom::End(0))?;

        info!(
            before = self.record_count,
            after = record_count,
            "Rewrote binlog"
        );
        self.file = file;
        self.record_count = record_count;
        self.size_bytes = size_bytes;
        self.dirty = false;
        Ok(())
    }

    /// Remove the log at `path` along with any leftover rewrite file
    ///
    /// Missing files are not an error.
    pub fn destroy(path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        remove_if_exists(path)?;
        remove_if_exists(&tmp_path(path))?;
        debug!(path = %path.display(), "Destroyed binlog");
        Ok(())
    }

    /// Flush everything to disk and close the log
    pub fn close(self) -> Result<(), StorageError> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Location of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently in the log
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Size of the log in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn frame(&self, record: &[u8]) -> Result<Vec<u8>, StorageError> {
        if record.is_empty() {
            return Err(StorageError::serialization("empty binlog record"));
        }
        if record.len() > self.config.max_record_size {
            return Err(StorageError::serialization(format!(
                "binlog record of {} bytes exceeds limit of {}",
                record.len(),
                self.config.max_record_size
            )));
        }
        let len = u32::try_from(record.len()).map_err(|_| {
            StorageError::serialization(format!(
                "binlog record of {} bytes does not fit a length prefix",
                record.len()
            ))
        })?;
        let mut frame = Vec::with_capacity(LEN_PREFIX as usize + record.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(record);
        Ok(frame)
    }
}

/// Walk the frames of `file` up to `file_size`, stopping at a torn tail
fn scan<F, E>(file: &File, file_size: u64, max_record_size: usize, mut f: F) -> Result<ScanOutcome, E>
where
    F: FnMut(&[u8]) -> Result<(), E>,
    E: From<StorageError>,
{
    let mut reader = BufReader::new(file);
    let mut offset = 0u64;
    let mut records = 0u64;

    while offset < file_size {
        let Some(record) = read_frame(&mut reader, offset, max_record_size)? else {
            break;
        };
        f(&record)?;
        offset += LEN_PREFIX + record.len() as u64;
        records += 1;
    }

    Ok(ScanOutcome {
        records,
        valid_len: offset,
    })
}

/// Read one frame; `None` means the file ends partway through it
fn read_frame<R: Read>(
    reader: &mut R,
    offset: u64,
    max_record_size: usize,
) -> Result<Option<Vec<u8>>, StorageError> {
    let mut len_buf = [0u8; LEN_PREFIX as usize];
    if !read_full(reader, &mut len_buf)? {
        warn!(offset, "Torn length prefix, stopping replay");
        return Ok(None);
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > max_record_size {
        return Err(StorageError::corrupt(
            offset,
            format!("invalid record length {}", len),
        ));
    }

    let mut record = vec![0u8; len];
    if !read_full(reader, &mut record)? {
        warn!(offset, len, "Torn record body, stopping replay");
        return Ok(None);
    }
    Ok(Some(record))
}

/// `read_exact` that reports a short read as `false` instead of an error
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, StorageError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Make a rename inside the log's directory durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<(), StorageError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
