//! Virtual file handles
//!
//! A handle opened for reading holds a [`PartTable`] and a logical cursor.
//! Reads never cross a part boundary: a read that reaches the end of a part
//! returns the bytes up to that boundary and the next read continues in the
//! following part. The `std::io::Read` impl therefore composes with
//! `read_exact`, `read_to_end` and `io::copy` as usual.
//!
//! A handle opened for writing streams bytes into one backend object, which
//! is only published when the handle is closed.

use crate::driver::Connection;
use crate::error::{BackendOp, Result, StoreError, VfsError};
use crate::offset::translate;
use crate::part_table::PartTable;
use crate::store::{ObjectWriter, WritePrecondition};
use std::fmt;
use std::io;
use tracing::{debug, error, info, warn};

/// Mode a virtual file is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl TryFrom<char> for OpenMode {
    type Error = VfsError;

    fn try_from(mode: char) -> Result<Self> {
        match mode {
            'r' => Ok(OpenMode::Read),
            'w' => Ok(OpenMode::Write),
            other => {
                error!("Invalid open mode {}", other);
                Err(VfsError::InvalidMode(format!("unsupported open mode '{}'", other)))
            }
        }
    }
}

/// Reference point of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekAnchor {
    Start,
    Current,
    End,
}

struct ReadState {
    table: PartTable,
    cursor: u64,
}

struct WriteState {
    bucket: String,
    key: String,
    writer: Box<dyn ObjectWriter>,
    written: u64,
}

enum HandleState {
    Reading(ReadState),
    Writing(WriteState),
    Closed,
}

/// An open virtual file
pub struct VirtualFile {
    connection: Connection,
    state: HandleState,
}

impl VirtualFile {
    /// Open the virtual file made of every object in `bucket` matching `pattern`
    pub(crate) fn open_read(connection: Connection, bucket: &str, pattern: &str) -> Result<Self> {
        connection.check()?;
        let table = PartTable::build(connection.store(), bucket, pattern)?;
        Ok(VirtualFile {
            connection,
            state: HandleState::Reading(ReadState { table, cursor: 0 }),
        })
    }

    /// Open an upload stream for the single object `key`
    pub(crate) fn open_write(
        connection: Connection,
        bucket: &str,
        key: &str,
        precondition: WritePrecondition,
    ) -> Result<Self> {
        connection.check()?;
        let writer = connection
            .store()
            .write_stream(bucket, key, precondition)
            .map_err(|e| {
                error!("Error initializing upload stream for {}/{}: {}", bucket, key, e);
                VfsError::backend(BackendOp::Write)(e)
            })?;

        Ok(VirtualFile {
            connection,
            state: HandleState::Writing(WriteState {
                bucket: bucket.to_string(),
                key: key.to_string(),
                writer,
                written: 0,
            }),
        })
    }

    /// Mode the handle was opened in, `None` once closed
    pub fn mode(&self) -> Option<OpenMode> {
        match self.state {
            HandleState::Reading(_) => Some(OpenMode::Read),
            HandleState::Writing(_) => Some(OpenMode::Write),
            HandleState::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, HandleState::Closed)
    }

    /// Part table backing a read handle
    pub fn table(&self) -> Option<&PartTable> {
        match &self.state {
            HandleState::Reading(state) => Some(&state.table),
            _ => None,
        }
    }

    /// Logical size of the virtual file
    pub fn size(&self) -> Result<u64> {
        Ok(self.reading()?.table.total_size())
    }

    /// Current logical cursor
    pub fn position(&self) -> Result<u64> {
        Ok(self.reading()?.cursor)
    }

    /// Move the cursor and return its new value
    ///
    /// Seeking past the end is allowed and makes subsequent reads return 0.
    /// A negative target fails with [`VfsError::InvalidSeek`] and leaves the
    /// cursor where it was.
    pub fn seek(&mut self, offset: i64, anchor: SeekAnchor) -> Result<u64> {
        debug!("seek {} {:?}", offset, anchor);
        let state = self.reading_mut()?;

        let base: i128 = match anchor {
            SeekAnchor::Start => 0,
            SeekAnchor::Current => state.cursor as i128,
            SeekAnchor::End => state.table.total_size() as i128,
        };
        let target = base + offset as i128;

        let cursor = u64::try_from(target).map_err(|_| {
            warn!("Invalid seek offset {}", target);
            VfsError::InvalidSeek(target)
        })?;
        state.cursor = cursor;
        Ok(cursor)
    }

    /// Read from the cursor into `buf`, returning the number of bytes read
    ///
    /// Returns 0 at or past the end of the file. A read stops at the end of
    /// the current part. On a backend error the cursor does not move.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        // Split borrows: the state is mutated, the connection only read
        let VirtualFile { connection, state } = self;
        let state = match state {
            HandleState::Reading(state) => state,
            HandleState::Writing(_) => {
                return Err(VfsError::InvalidMode(
                    "read on a handle opened for writing".to_string(),
                ))
            }
            HandleState::Closed => return Err(VfsError::UseAfterClose),
        };
        connection.check()?;

        if buf.is_empty() {
            return Ok(0);
        }
        let Some(location) = translate(&state.table, state.cursor) else {
            debug!("read at {} is past end of file", state.cursor);
            return Ok(0);
        };

        let part = state.table.part(location.part_index);
        let want = (buf.len() as u64).min(location.remaining_in_part) as usize;
        debug!(
            "read {} bytes at logical {} -> {}/{} @ {}",
            want, state.cursor, part.bucket, part.key, location.physical_offset
        );

        let n = connection
            .store()
            .read_range(
                &part.bucket,
                &part.key,
                location.physical_offset,
                &mut buf[..want],
            )
            .map_err(|e| {
                error!("Error reading {}/{}: {}", part.bucket, part.key, e);
                VfsError::backend(BackendOp::Read)(e)
            })?;

        // Inside the logical range, so 0 bytes means the object shrank
        if n == 0 {
            error!(
                "{}/{} ended at {} before its listed size {}",
                part.bucket, part.key, location.physical_offset, part.size
            );
            return Err(VfsError::backend(BackendOp::Read)(StoreError::internal(
                format!("{}/{} is shorter than listed", part.bucket, part.key),
            )));
        }

        state.cursor += n as u64;
        Ok(n)
    }

    /// Append `data` to the upload, returning the number of bytes accepted
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let VirtualFile { connection, state } = self;
        let state = match state {
            HandleState::Writing(state) => state,
            HandleState::Reading(_) => {
                return Err(VfsError::InvalidMode(
                    "write on a handle opened for reading".to_string(),
                ))
            }
            HandleState::Closed => return Err(VfsError::UseAfterClose),
        };
        connection.check()?;

        state.writer.write(data).map_err(|e| {
            error!("Error during upload to {}/{}: {}", state.bucket, state.key, e);
            VfsError::backend(BackendOp::Write)(e)
        })?;
        state.written += data.len() as u64;
        Ok(data.len())
    }

    /// Close the handle, finalizing the upload of a write handle
    ///
    /// Any further call, including a second `close`, fails with
    /// [`VfsError::UseAfterClose`].
    pub fn close(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, HandleState::Closed);
        match state {
            HandleState::Closed => Err(VfsError::UseAfterClose),
            HandleState::Reading(state) => {
                debug!("close read handle over {} parts", state.table.len());
                Ok(())
            }
            HandleState::Writing(state) => {
                // A dropped writer abandons the upload
                self.connection.check()?;
                let meta = state.writer.finish().map_err(|e| {
                    error!("Error during upload of {}/{}: {}", state.bucket, state.key, e);
                    VfsError::backend(BackendOp::Finalize)(e)
                })?;
                info!("Uploaded {}/{} ({} bytes)", state.bucket, meta.key, meta.size);
                Ok(())
            }
        }
    }

    fn reading(&self) -> Result<&ReadState> {
        match &self.state {
            HandleState::Reading(state) => {
                self.connection.check()?;
                Ok(state)
            }
            HandleState::Writing(_) => Err(VfsError::InvalidMode(
                "operation requires a handle opened for reading".to_string(),
            )),
            HandleState::Closed => Err(VfsError::UseAfterClose),
        }
    }

    fn reading_mut(&mut self) -> Result<&mut ReadState> {
        let VirtualFile { connection, state } = self;
        match state {
            HandleState::Reading(state) => {
                connection.check()?;
                Ok(state)
            }
            HandleState::Writing(_) => Err(VfsError::InvalidMode(
                "operation requires a handle opened for reading".to_string(),
            )),
            HandleState::Closed => Err(VfsError::UseAfterClose),
        }
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            HandleState::Reading(state) => f
                .debug_struct("VirtualFile")
                .field("mode", &OpenMode::Read)
                .field("parts", &state.table.len())
                .field("size", &state.table.total_size())
                .field("cursor", &state.cursor)
                .finish(),
            HandleState::Writing(state) => f
                .debug_struct("VirtualFile")
                .field("mode", &OpenMode::Write)
                .field("target", &format_args!("{}/{}", state.bucket, state.key))
                .field("written", &state.written)
                .finish(),
            HandleState::Closed => f.debug_struct("VirtualFile").field("closed", &true).finish(),
        }
    }
}

impl Drop for VirtualFile {
    fn drop(&mut self) {
        if let HandleState::Writing(state) = &self.state {
            warn!(
                "Write handle for {}/{} dropped without close, upload abandoned",
                state.bucket, state.key
            );
        }
    }
}

impl io::Read for VirtualFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        VirtualFile::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Seek for VirtualFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, anchor) = match pos {
            io::SeekFrom::Start(n) => {
                let n = i64::try_from(n).map_err(|_| VfsError::InvalidSeek(n as i128))?;
                (n, SeekAnchor::Start)
            }
            io::SeekFrom::Current(n) => (n, SeekAnchor::Current),
            io::SeekFrom::End(n) => (n, SeekAnchor::End),
        };
        VirtualFile::seek(self, offset, anchor).map_err(io::Error::from)
    }
}

impl io::Write for VirtualFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        VirtualFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Object uploads are only flushed by close
        Ok(())
    }
}
