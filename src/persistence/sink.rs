//! Byte-oriented persistence sink contract and the file-backed default.
//!
//! The core only requires five operations of its durable storage target:
//! seek-to-start, truncate, write, flush, and read-to-end. The host may
//! supply anything satisfying the trait; [`FileSink`] covers the common
//! case of a file on disk.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A seekable, readable-and-writable storage target for the pending queue.
///
/// Saves always overwrite the sink's entire content: seek to start,
/// truncate, write, flush. Loads read the full content once at startup.
pub trait PersistenceSink: Send {
    /// Positions the sink at its first byte.
    fn seek_start(&mut self) -> io::Result<()>;

    /// Discards all content after the current position.
    fn truncate(&mut self) -> io::Result<()>;

    /// Writes the full buffer at the current position.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Makes prior writes durable.
    fn flush(&mut self) -> io::Result<()>;

    /// Reads from the current position to the end of the sink.
    fn read_to_end(&mut self) -> io::Result<Vec<u8>>;
}

/// A [`PersistenceSink`] backed by a file on disk.
///
/// `flush` syncs file data to the device, so a completed save survives
/// power loss. The file is created if it does not exist.
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Opens (creating if necessary) the file at `path` for read/write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(FileSink { file })
    }
}

impl PersistenceSink for FileSink {
    fn seek_start(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn truncate(&mut self) -> io::Result<()> {
        let pos = self.file.stream_position()?;
        self.file.set_len(pos)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }

    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
