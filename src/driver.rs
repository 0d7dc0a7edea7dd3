//! Driver facade
//!
//! [`Driver`] is the entry point used by the surrounding shell: it resolves
//! logical paths against its configuration, owns the backend connection and
//! hands out [`VirtualFile`] handles.

use crate::config::DriverConfig;
use crate::copy;
use crate::error::{BackendOp, Result, VfsError};
use crate::handle::{OpenMode, VirtualFile};
use crate::part_table::PartTable;
use crate::pattern::KeyPattern;
use crate::store::{ObjectStore, WritePrecondition};
use crate::uri::ObjectUri;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Driver name reported to the shell
pub const DRIVER_NAME: &str = "objfile driver";

/// Free space reported for any path: 5 TiB
pub const DISK_FREE_SPACE: u64 = 5 << 40;

/// Live backend connection shared by the driver and its handles
///
/// Handles keep a clone; once the driver disconnects, every clone reports
/// [`VfsError::Disconnected`].
#[derive(Clone)]
pub(crate) struct Connection {
    store: Arc<dyn ObjectStore>,
    live: Arc<AtomicBool>,
}

impl Connection {
    pub(crate) fn new(store: Arc<dyn ObjectStore>) -> Self {
        Connection {
            store,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(VfsError::Disconnected)
        }
    }

    pub(crate) fn invalidate(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Virtual file driver over an object store
pub struct Driver {
    config: DriverConfig,
    connection: RwLock<Option<Connection>>,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Driver {
            config,
            connection: RwLock::new(None),
        }
    }

    /// Driver configured from `OBJFILE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(DriverConfig::from_env()?))
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn scheme(&self) -> &str {
        &self.config.scheme
    }

    pub fn is_read_only(&self) -> bool {
        false
    }

    pub fn preferred_buffer_size(&self) -> usize {
        self.config.preferred_buffer_size
    }

    /// Attach a backend, replacing and invalidating any previous connection
    pub fn connect(&self, store: Arc<dyn ObjectStore>) {
        let mut slot = self.connection.write();
        if let Some(old) = slot.take() {
            old.invalidate();
        }
        *slot = Some(Connection::new(store));
        info!(
            "Connected {} {} (scheme {})",
            DRIVER_NAME,
            self.version(),
            self.config.scheme
        );
    }

    /// Drop the backend; open handles fail with [`VfsError::Disconnected`]
    pub fn disconnect(&self) {
        if let Some(old) = self.connection.write().take() {
            old.invalidate();
            info!("Disconnected {}", DRIVER_NAME);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.read().is_some()
    }

    /// Open the virtual file at `path`
    ///
    /// In read mode the object segment may be a glob; every matching object
    /// becomes a part of the file. In write mode it must name one object,
    /// which is created or overwritten when the handle is closed.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<VirtualFile> {
        match mode {
            OpenMode::Read => {
                let uri = self.resolve(path)?;
                debug!("open {} for reading", uri);
                VirtualFile::open_read(self.connection()?, &uri.bucket, &uri.pattern)
            }
            OpenMode::Write => self.open_write(path, WritePrecondition::None),
        }
    }

    pub(crate) fn open_write(
        &self,
        path: &str,
        precondition: WritePrecondition,
    ) -> Result<VirtualFile> {
        let uri = self.resolve(path)?;
        if uri.is_glob() {
            error!("Cannot write to a pattern: {}", uri);
            return Err(VfsError::InvalidUri(format!(
                "{} names a pattern, writes need a single object",
                path
            )));
        }
        debug!("open {} for writing ({:?})", uri, precondition);
        VirtualFile::open_write(self.connection()?, &uri.bucket, &uri.pattern, precondition)
    }

    /// Logical size of the virtual file at `path`, or -1 on any failure
    pub fn size(&self, path: &str) -> i64 {
        match self.try_size(path) {
            Ok(size) => i64::try_from(size).unwrap_or(i64::MAX),
            Err(e) => {
                debug!("size of {} unavailable: {}", path, e);
                -1
            }
        }
    }

    /// Logical size of the virtual file at `path`
    pub fn try_size(&self, path: &str) -> Result<u64> {
        let uri = self.resolve(path)?;
        let connection = self.connection()?;
        let table = PartTable::build(connection.store(), &uri.bucket, &uri.pattern)?;
        Ok(table.total_size())
    }

    /// Directory-style query for a trailing `/`, object query otherwise
    pub fn exists(&self, path: &str) -> bool {
        if path.ends_with('/') {
            self.dir_exists(path)
        } else {
            self.file_exists(path)
        }
    }

    /// Whether at least one object matches `path`
    pub fn file_exists(&self, path: &str) -> bool {
        match self.count_matches(path) {
            Ok(n) => n > 0,
            Err(e) => {
                debug!("exists {} failed: {}", path, e);
                false
            }
        }
    }

    /// Object stores have no directories, so every directory exists
    pub fn dir_exists(&self, path: &str) -> bool {
        debug!("dir_exists {}: always true", path);
        true
    }

    /// Delete the single object named by `path`
    pub fn remove(&self, path: &str) -> Result<()> {
        let uri = self.resolve(path)?;
        if uri.is_glob() {
            error!("Refusing to remove a pattern: {}", uri);
            return Err(VfsError::InvalidUri(format!(
                "{} names a pattern, remove needs a single object",
                path
            )));
        }
        let connection = self.connection()?;
        let store = connection.store();

        let exists = store.metadata(&uri.bucket, &uri.pattern).map_err(|e| {
            error!("Error looking up {}: {}", uri, e);
            VfsError::backend(BackendOp::Metadata)(e)
        })?;
        if exists.is_none() {
            debug!("remove {}: not found", uri);
            return Err(VfsError::NotFound(uri.to_string()));
        }

        store
            .delete(&uri.bucket, &uri.pattern)
            .map_err(|e| {
                if e.is_not_found() {
                    debug!("remove {}: not found", uri);
                    VfsError::NotFound(uri.to_string())
                } else {
                    error!("Error deleting {}: {}", uri, e);
                    VfsError::backend(BackendOp::Delete)(e)
                }
            })?;
        info!("Removed {}", uri);
        Ok(())
    }

    pub fn mkdir(&self, path: &str) -> Result<()> {
        self.connection()?;
        debug!("mkdir {}: nothing to do", path);
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        self.connection()?;
        debug!("rmdir {}: nothing to do", path);
        Ok(())
    }

    pub fn disk_free_space(&self, _path: &str) -> u64 {
        DISK_FREE_SPACE
    }

    /// Download the virtual file at `source` into a new local file
    pub fn copy_to_local<P: AsRef<Path>>(&self, source: &str, dest: P) -> Result<u64> {
        copy::copy_to_local(self, source, dest.as_ref())
    }

    /// Upload a local file to a new object at `dest`
    pub fn copy_from_local<P: AsRef<Path>>(&self, source: P, dest: &str) -> Result<u64> {
        copy::copy_from_local(self, source.as_ref(), dest)
    }

    fn resolve(&self, path: &str) -> Result<ObjectUri> {
        ObjectUri::resolve(
            path,
            &self.config.scheme,
            self.config.default_bucket.as_deref(),
        )
    }

    fn connection(&self) -> Result<Connection> {
        self.connection.read().clone().ok_or_else(|| {
            error!("{} used before connect", DRIVER_NAME);
            VfsError::NotConnected
        })
    }

    fn count_matches(&self, path: &str) -> Result<usize> {
        let uri = self.resolve(path)?;
        let pattern = KeyPattern::new(&uri.pattern)?;
        let connection = self.connection()?;
        let objects = connection.store().list(&uri.bucket, &pattern).map_err(|e| {
            error!("Error listing {}: {}", uri, e);
            VfsError::backend(BackendOp::List)(e)
        })?;
        Ok(objects.len())
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}
