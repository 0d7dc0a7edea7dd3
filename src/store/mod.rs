//! Object store backend abstraction
//!
//! All backend access goes through [`ObjectStore`], so the driver can run
//! against a remote service, a local directory tree or an in-memory fake.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::pattern::KeyPattern;

/// Name and size of one stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

impl ObjectMeta {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        ObjectMeta {
            key: key.into(),
            size,
        }
    }
}

/// Condition checked when an upload is finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePrecondition {
    /// Create or overwrite
    #[default]
    None,
    /// Fail with `AlreadyExists` if the object is already present
    DoesNotExist,
}

/// Appendable upload stream for one object
///
/// Nothing is visible to readers until [`finish`](ObjectWriter::finish)
/// succeeds.
pub trait ObjectWriter: Send {
    /// Append bytes to the upload.
    fn write(&mut self, data: &[u8]) -> StoreResult<()>;

    /// Finalize the upload and publish the object.
    fn finish(self: Box<Self>) -> StoreResult<ObjectMeta>;
}

/// Object storage backend
pub trait ObjectStore: Send + Sync {
    /// List objects in `bucket` whose keys match `pattern`, sorted by key.
    fn list(&self, bucket: &str, pattern: &KeyPattern) -> StoreResult<Vec<ObjectMeta>>;

    /// Read up to `buf.len()` bytes of `key` starting at `start`.
    ///
    /// Returns the number of bytes read; a count smaller than `buf.len()`
    /// means the end of the object was reached.
    fn read_range(&self, bucket: &str, key: &str, start: u64, buf: &mut [u8])
        -> StoreResult<usize>;

    /// Open an upload stream for `key`.
    fn write_stream(
        &self,
        bucket: &str,
        key: &str,
        precondition: WritePrecondition,
    ) -> StoreResult<Box<dyn ObjectWriter>>;

    /// Delete one object.
    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Size of one object, `None` if it does not exist.
    fn metadata(&self, bucket: &str, key: &str) -> StoreResult<Option<u64>>;
}
