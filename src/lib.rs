//! # objfile - Virtual Files over Object Storage
//!
//! `objfile` presents objects in a bucket as ordinary files with random-access
//! reads and streaming writes:
//!
//! - **Multi-part files**: a glob such as `gs://bucket/export/part-*.csv`
//!   opens every matching object, in key order, as one logical file
//! - **Header deduplication**: when every part starts with the same first line,
//!   that line is kept only once, so sharded CSV exports read as one table
//! - **Atomic uploads**: bytes written to a handle are published when it closes
//! - **Pluggable backends**: anything implementing [`ObjectStore`], with an
//!   in-memory store and a local-directory store built in
//!
//! ## Quick Start
//!
//! ```rust
//! use objfile::{Driver, DriverConfig, MemoryStore, OpenMode, Result, SeekAnchor};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let store = MemoryStore::new();
//! store.put_object("exports", "users/part-0.csv", "id,name\n1,alice\n");
//! store.put_object("exports", "users/part-1.csv", "id,name\n2,bob\n");
//!
//! let driver = Driver::new(DriverConfig::default());
//! driver.connect(Arc::new(store));
//!
//! // The shared header is counted once
//! assert_eq!(driver.size("gs://exports/users/part-*.csv"), 22);
//!
//! let mut file = driver.open("gs://exports/users/part-*.csv", OpenMode::Read)?;
//! file.seek(16, SeekAnchor::Start)?;
//! let mut buf = [0u8; 6];
//! file.read(&mut buf)?;
//! assert_eq!(&buf, b"2,bob\n");
//! file.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod copy;
pub mod driver;
pub mod error;
pub mod handle;
pub mod offset;
pub mod part_table;
pub mod pattern;
pub mod store;
pub mod uri;

pub use config::DriverConfig;
pub use copy::{copy_from_local, copy_to_local};
pub use driver::{Driver, DISK_FREE_SPACE, DRIVER_NAME};
pub use error::{BackendOp, Result, StatusCode, StoreError, StoreResult, VfsError};
pub use handle::{OpenMode, SeekAnchor, VirtualFile};
pub use offset::{translate, Location};
pub use part_table::{Part, PartLayout, PartTable};
pub use pattern::KeyPattern;
pub use store::{LocalStore, MemoryStore, ObjectMeta, ObjectStore, ObjectWriter, WritePrecondition};
pub use uri::ObjectUri;
