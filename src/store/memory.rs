//! In-memory object store
//!
//! Keeps every bucket in a sorted map behind a lock. Used by tests and for
//! scratch work; failures can be injected per bucket or per key to exercise
//! error paths.

use super::{ObjectMeta, ObjectStore, ObjectWriter, WritePrecondition};
use crate::error::{StatusCode, StoreError, StoreResult};
use crate::pattern::KeyPattern;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Faults {
    list: HashSet<String>,
    reads: HashSet<String>,
    writes: HashSet<String>,
    finalize: HashSet<String>,
    metadata: HashSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    faults: Mutex<Faults>,
    range_reads: AtomicUsize,
}

/// Object store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous content
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        debug!("put_object {}/{} ({} bytes)", bucket, key, data.len());
        let mut buckets = self.inner.buckets.write();
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data);
    }

    /// Fetch a copy of an object's content
    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let buckets = self.inner.buckets.read();
        buckets.get(bucket).and_then(|b| b.get(key)).cloned()
    }

    /// Make every listing of `bucket` fail
    pub fn fail_list(&self, bucket: &str) {
        self.inner.faults.lock().list.insert(bucket.to_string());
    }

    /// Make every range read of `key` fail
    pub fn fail_reads(&self, key: &str) {
        self.inner.faults.lock().reads.insert(key.to_string());
    }

    /// Make every chunk written to `key` fail
    pub fn fail_writes(&self, key: &str) {
        self.inner.faults.lock().writes.insert(key.to_string());
    }

    /// Make finalizing an upload of `key` fail
    pub fn fail_finalize(&self, key: &str) {
        self.inner.faults.lock().finalize.insert(key.to_string());
    }

    /// Make every size lookup of `key` fail
    pub fn fail_metadata(&self, key: &str) {
        self.inner.faults.lock().metadata.insert(key.to_string());
    }

    /// Remove all injected failures
    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = Faults::default();
    }

    /// Number of range reads served so far
    pub fn range_reads(&self) -> usize {
        self.inner.range_reads.load(Ordering::Relaxed)
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, bucket: &str, pattern: &KeyPattern) -> StoreResult<Vec<ObjectMeta>> {
        if self.inner.faults.lock().list.contains(bucket) {
            return Err(StoreError::unavailable(format!("listing {} failed", bucket)));
        }

        let buckets = self.inner.buckets.read();
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let prefix = pattern.literal_prefix();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, data)| ObjectMeta::new(key.clone(), data.len() as u64))
            .collect())
    }

    fn read_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        buf: &mut [u8],
    ) -> StoreResult<usize> {
        self.inner.range_reads.fetch_add(1, Ordering::Relaxed);

        if self.inner.faults.lock().reads.contains(key) {
            return Err(StoreError::unavailable(format!(
                "reading {}/{} failed",
                bucket, key
            )));
        }

        let buckets = self.inner.buckets.read();
        let data = buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", bucket, key)))?;

        let start = (start as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_stream(
        &self,
        bucket: &str,
        key: &str,
        precondition: WritePrecondition,
    ) -> StoreResult<Box<dyn ObjectWriter>> {
        Ok(Box::new(MemoryWriter {
            inner: Arc::clone(&self.inner),
            bucket: bucket.to_string(),
            key: key.to_string(),
            precondition,
            buffer: Vec::new(),
        }))
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut buckets = self.inner.buckets.write();
        buckets
            .get_mut(bucket)
            .and_then(|b| b.remove(key))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", bucket, key)))
    }

    fn metadata(&self, bucket: &str, key: &str) -> StoreResult<Option<u64>> {
        if self.inner.faults.lock().metadata.contains(key) {
            return Err(StoreError::unavailable(format!(
                "metadata for {}/{} failed",
                bucket, key
            )));
        }

        let buckets = self.inner.buckets.read();
        Ok(buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|data| data.len() as u64))
    }
}

struct MemoryWriter {
    inner: Arc<Inner>,
    bucket: String,
    key: String,
    precondition: WritePrecondition,
    buffer: Vec<u8>,
}

impl ObjectWriter for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> StoreResult<()> {
        if self.inner.faults.lock().writes.contains(&self.key) {
            return Err(StoreError::unavailable(format!(
                "writing {}/{} failed",
                self.bucket, self.key
            )));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn finish(self: Box<Self>) -> StoreResult<ObjectMeta> {
        let MemoryWriter {
            inner,
            bucket,
            key,
            precondition,
            buffer,
        } = *self;

        if inner.faults.lock().finalize.contains(&key) {
            return Err(StoreError::unavailable(format!(
                "finalizing {}/{} failed",
                bucket, key
            )));
        }

        let mut buckets = inner.buckets.write();
        let objects = buckets.entry(bucket.clone()).or_default();

        if precondition == WritePrecondition::DoesNotExist && objects.contains_key(&key) {
            return Err(StoreError::new(
                StatusCode::AlreadyExists,
                format!("{}/{} already exists", bucket, key),
            ));
        }

        let size = buffer.len() as u64;
        objects.insert(key.clone(), buffer);
        Ok(ObjectMeta::new(key, size))
    }
}
