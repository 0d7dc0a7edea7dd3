//! Local directory object store
//!
//! Each bucket is a sub-directory of the root, each object a file below it.
//! Keys use `/` separators regardless of platform. Uploads are staged in a
//! temporary file inside the bucket and renamed into place on finish.

use super::{ObjectMeta, ObjectStore, ObjectWriter, WritePrecondition};
use crate::error::{StatusCode, StoreError, StoreResult};
use crate::pattern::KeyPattern;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const STAGING_PREFIX: &str = ".objfile-upload-";

/// Object store backed by a directory tree
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root` (created if missing)
    pub fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(LocalStore {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::new(
                StatusCode::InvalidArgument,
                format!("invalid bucket name: {}", bucket),
            ));
        }
        Ok(self.root.join(bucket))
    }

    /// Map a key to a file path, rejecting keys that escape the bucket
    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.bucket_dir(bucket)?;
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::new(
                StatusCode::InvalidArgument,
                format!("invalid object key: {}", key),
            ));
        }
        for segment in key.split('/') {
            path.push(segment);
        }
        Ok(path)
    }

    /// Recursively collect every file below `dir` as a `/`-separated key
    fn collect_keys(dir: &Path, prefix: &str, out: &mut Vec<ObjectMeta>) -> StoreResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            // in-flight uploads
            if name.starts_with(STAGING_PREFIX) {
                continue;
            }
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                Self::collect_keys(&entry.path(), &key, out)?;
            } else if file_type.is_file() {
                out.push(ObjectMeta::new(key, entry.metadata()?.len()));
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn list(&self, bucket: &str, pattern: &KeyPattern) -> StoreResult<Vec<ObjectMeta>> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            debug!("Bucket directory {:?} does not exist", dir);
            return Ok(Vec::new());
        }

        if pattern.is_literal() {
            let path = self.object_path(bucket, pattern.as_str())?;
            return match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => {
                    Ok(vec![ObjectMeta::new(pattern.as_str(), meta.len())])
                }
                Ok(_) => Ok(Vec::new()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            };
        }

        let mut objects = Vec::new();
        Self::collect_keys(&dir, "", &mut objects)?;
        objects.retain(|o| pattern.matches(&o.key));
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn read_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        buf: &mut [u8],
    ) -> StoreResult<usize> {
        let path = self.object_path(bucket, key)?;
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(start))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write_stream(
        &self,
        bucket: &str,
        key: &str,
        precondition: WritePrecondition,
    ) -> StoreResult<Box<dyn ObjectWriter>> {
        let target = self.object_path(bucket, key)?;
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::internal(format!("no parent for {:?}", target)))?;
        fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(parent)?;
        Ok(Box::new(LocalWriter {
            key: key.to_string(),
            target,
            precondition,
            staging,
            written: 0,
        }))
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let path = self.object_path(bucket, key)?;
        fs::remove_file(&path)?;
        Ok(())
    }

    fn metadata(&self, bucket: &str, key: &str) -> StoreResult<Option<u64>> {
        let path = self.object_path(bucket, key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

struct LocalWriter {
    key: String,
    target: PathBuf,
    precondition: WritePrecondition,
    staging: NamedTempFile,
    written: u64,
}

impl ObjectWriter for LocalWriter {
    fn write(&mut self, data: &[u8]) -> StoreResult<()> {
        self.staging.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    fn finish(self: Box<Self>) -> StoreResult<ObjectMeta> {
        let LocalWriter {
            key,
            target,
            precondition,
            mut staging,
            written,
        } = *self;

        staging.flush()?;
        let persisted = match precondition {
            WritePrecondition::None => staging.persist(&target),
            WritePrecondition::DoesNotExist => staging.persist_noclobber(&target),
        };
        persisted.map_err(|e| StoreError::from(e.error))?;

        debug!("Persisted {} bytes to {:?}", written, target);
        Ok(ObjectMeta::new(key, written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn put(store: &LocalStore, bucket: &str, key: &str, data: &[u8]) {
        let mut writer = store
            .write_stream(bucket, key, WritePrecondition::None)
            .unwrap();
        writer.write(data).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_write_and_read_range() {
        let (dir, store) = create_store();
        put(&store, "bucket", "dir/file.txt", b"hello world");

        let mut buf = [0u8; 5];
        assert_eq!(store.read_range("bucket", "dir/file.txt", 6, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
        assert_eq!(store.metadata("bucket", "dir/file.txt").unwrap(), Some(11));
        assert_eq!(
            std::fs::read(dir.path().join("bucket/dir/file.txt")).unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn test_list_glob_recursive() {
        let (_dir, store) = create_store();
        put(&store, "bucket", "split/part-2.txt", b"22");
        put(&store, "bucket", "split/part-1.txt", b"1");
        put(&store, "bucket", "split/sub/part-3.txt", b"333");

        let flat = store
            .list("bucket", &KeyPattern::new("split/part-*.txt").unwrap())
            .unwrap();
        let keys: Vec<_> = flat.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["split/part-1.txt", "split/part-2.txt"]);

        let deep = store
            .list("bucket", &KeyPattern::new("split/**/part-*.txt").unwrap())
            .unwrap();
        assert_eq!(deep.len(), 3);
        assert_eq!(deep[2], ObjectMeta::new("split/sub/part-3.txt", 3));
    }

    #[test]
    fn test_list_literal_and_missing_bucket() {
        let (_dir, store) = create_store();
        put(&store, "bucket", "a.txt", b"abc");

        let found = store.list("bucket", &KeyPattern::new("a.txt").unwrap()).unwrap();
        assert_eq!(found, vec![ObjectMeta::new("a.txt", 3)]);
        assert!(store
            .list("bucket", &KeyPattern::new("b.txt").unwrap())
            .unwrap()
            .is_empty());
        assert!(store
            .list("nobucket", &KeyPattern::new("*").unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_no_clobber() {
        let (dir, store) = create_store();
        put(&store, "bucket", "a.txt", b"old");

        let mut writer = store
            .write_stream("bucket", "a.txt", WritePrecondition::DoesNotExist)
            .unwrap();
        writer.write(b"new").unwrap();
        assert!(writer.finish().is_err());
        assert_eq!(std::fs::read(dir.path().join("bucket/a.txt")).unwrap(), b"old");
    }

    #[test]
    fn test_unfinished_upload_is_invisible() {
        let (_dir, store) = create_store();
        let mut writer = store
            .write_stream("bucket", "pending.txt", WritePrecondition::None)
            .unwrap();
        writer.write(b"partial").unwrap();
        drop(writer);

        assert_eq!(store.metadata("bucket", "pending.txt").unwrap(), None);
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let (_dir, store) = create_store();
        assert!(store.metadata("bucket", "../outside").is_err());
        assert!(store.metadata("../x", "file").is_err());
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = create_store();
        put(&store, "bucket", "a.txt", b"abc");
        store.delete("bucket", "a.txt").unwrap();
        assert!(store.delete("bucket", "a.txt").unwrap_err().is_not_found());
    }
}
