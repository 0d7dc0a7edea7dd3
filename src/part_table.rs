//! Part table construction
//!
//! A virtual file is the ordered concatenation of every object matching a
//! pattern. When all parts start with the same first line (sharded exports
//! repeat their header in every shard) that line is counted once: it stays in
//! part 0 and is skipped in every later part.

use crate::error::{BackendOp, Result, VfsError};
use crate::pattern::KeyPattern;
use crate::store::{ObjectMeta, ObjectStore};
use tracing::{debug, error};

/// Bytes fetched per round trip while looking for the end of the header line
pub const HEADER_PROBE_CHUNK: usize = 4096;

/// One backend object participating in a virtual file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub bucket: String,
    pub key: String,
    /// Raw object size
    pub size: u64,
    /// Leading bytes skipped in this part (0 for part 0 and when nothing is shared)
    pub header_len: u64,
}

impl Part {
    /// Logical bytes this part adds to the virtual file
    pub fn contribution(&self) -> u64 {
        self.size - self.header_len
    }
}

/// How the parts of a table are stitched together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartLayout {
    /// A single object
    Single,
    /// Several objects concatenated verbatim
    Concatenated,
    /// Several objects sharing a first line of `header_len` bytes, counted once
    SharedHeader { header_len: u64 },
}

/// Ordered parts plus their cumulative logical sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTable {
    parts: Vec<Part>,
    cumulative: Vec<u64>,
    layout: PartLayout,
}

impl PartTable {
    /// Build a table from listed objects and a detected header length
    ///
    /// `header_len` is skipped in every object except the first; pass 0 when
    /// the objects share no header.
    ///
    /// # Panics
    ///
    /// Panics if `objects` is empty or if a non-first object is shorter than
    /// `header_len`.
    pub fn new(bucket: &str, objects: Vec<ObjectMeta>, header_len: u64) -> Self {
        assert!(!objects.is_empty(), "a part table needs at least one part");

        let layout = match (objects.len(), header_len) {
            (1, _) => PartLayout::Single,
            (_, 0) => PartLayout::Concatenated,
            (_, len) => PartLayout::SharedHeader { header_len: len },
        };
        let skipped = match layout {
            PartLayout::SharedHeader { header_len } => header_len,
            _ => 0,
        };

        let parts: Vec<Part> = objects
            .into_iter()
            .enumerate()
            .map(|(i, meta)| {
                let header_len = if i == 0 { 0 } else { skipped };
                assert!(meta.size >= header_len, "part {} shorter than header", meta.key);
                Part {
                    bucket: bucket.to_string(),
                    key: meta.key,
                    size: meta.size,
                    header_len,
                }
            })
            .collect();

        let cumulative = parts
            .iter()
            .scan(0u64, |total, part| {
                *total += part.contribution();
                Some(*total)
            })
            .collect();

        PartTable {
            parts,
            cumulative,
            layout,
        }
    }

    /// List, measure and header-check every object matching `pattern`
    pub fn build(store: &dyn ObjectStore, bucket: &str, pattern: &str) -> Result<Self> {
        let key_pattern = KeyPattern::new(pattern)?;

        let mut objects = store.list(bucket, &key_pattern).map_err(|e| {
            error!("Error listing {}/{}: {}", bucket, pattern, e);
            VfsError::backend(BackendOp::List)(e)
        })?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        if objects.is_empty() {
            debug!("No object matches {}/{}", bucket, pattern);
            return Err(VfsError::NotFound(format!("{}/{}", bucket, pattern)));
        }

        let header_len = if objects.len() > 1 {
            detect_shared_header(store, bucket, &objects)?
        } else {
            0
        };

        let table = PartTable::new(bucket, objects, header_len);
        debug!(
            "Part table for {}/{}: {} parts, layout {:?}, total {} bytes",
            bucket,
            pattern,
            table.len(),
            table.layout,
            table.total_size()
        );
        Ok(table)
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> &Part {
        &self.parts[index]
    }

    /// Logical bytes available through the end of each part
    pub fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }

    pub fn layout(&self) -> PartLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always false: a table holds at least one part
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Logical size of the virtual file
    pub fn total_size(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }
}

/// Length of the first line of `objects[0]` if every object starts with it, else 0
fn detect_shared_header(
    store: &dyn ObjectStore,
    bucket: &str,
    objects: &[ObjectMeta],
) -> Result<u64> {
    let Some(header) = read_first_line(store, bucket, &objects[0])? else {
        debug!("{} has no line terminator, no shared header", objects[0].key);
        return Ok(0);
    };

    for other in &objects[1..] {
        if other.size < header.len() as u64 {
            debug!("{} is shorter than the header, no shared header", other.key);
            return Ok(0);
        }
        let prefix = read_prefix(store, bucket, &other.key, header.len())?;
        if prefix != header {
            debug!("{} starts with a different header", other.key);
            return Ok(0);
        }
    }

    debug!("Shared header of {} bytes across {} parts", header.len(), objects.len());
    Ok(header.len() as u64)
}

/// Bytes up to and including the first `\n`, or `None` if the object has none
fn read_first_line(
    store: &dyn ObjectStore,
    bucket: &str,
    object: &ObjectMeta,
) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let mut chunk = vec![0u8; HEADER_PROBE_CHUNK];

    while (line.len() as u64) < object.size {
        let n = store
            .read_range(bucket, &object.key, line.len() as u64, &mut chunk)
            .map_err(|e| {
                error!("Error reading header of {}/{}: {}", bucket, object.key, e);
                VfsError::backend(BackendOp::Read)(e)
            })?;
        if n == 0 {
            break;
        }

        if let Some(pos) = chunk[..n].iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&chunk[..=pos]);
            return Ok(Some(line));
        }
        line.extend_from_slice(&chunk[..n]);
    }

    Ok(None)
}

/// Exactly `len` leading bytes of an object (fewer if the object is shorter)
fn read_prefix(store: &dyn ObjectStore, bucket: &str, key: &str, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        let n = store
            .read_range(bucket, key, filled as u64, &mut buf[filled..])
            .map_err(|e| {
                error!("Error reading header of {}/{}: {}", bucket, key, e);
                VfsError::backend(BackendOp::Read)(e)
            })?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const CONTENT_1: &str = "mock_header\nmock_content_1";
    const CONTENT_3: &str = "mock_header\nmock_content_3_larger";

    #[test]
    fn test_single_object() {
        let store = MemoryStore::new();
        store.put_object("b", "file.txt", vec![7u8; 100]);

        let table = PartTable::build(&store, "b", "file.txt").unwrap();
        assert_eq!(table.layout(), PartLayout::Single);
        assert_eq!(table.cumulative(), &[100]);
        assert_eq!(table.total_size(), 100);
        // No header probe for a single part
        assert_eq!(store.range_reads(), 0);
    }

    #[test]
    fn test_shared_header_deduplicated() {
        let store = MemoryStore::new();
        store.put_object("b", "mock_file_1", CONTENT_1);
        store.put_object("b", "mock_file_3", CONTENT_3);

        let table = PartTable::build(&store, "b", "mock_file_*").unwrap();
        assert_eq!(table.layout(), PartLayout::SharedHeader { header_len: 12 });
        assert_eq!(table.part(0).header_len, 0);
        assert_eq!(table.part(1).header_len, 12);
        assert_eq!(table.cumulative(), &[26, 26 + 33 - 12]);
    }

    #[test]
    fn test_different_headers_not_deduplicated() {
        let store = MemoryStore::new();
        store.put_object("b", "mock_file_1", CONTENT_1);
        store.put_object("b", "mock_file_2", "mock_content_2");

        let table = PartTable::build(&store, "b", "mock_file_*").unwrap();
        assert_eq!(table.layout(), PartLayout::Concatenated);
        assert_eq!(table.total_size(), 26 + 14);
        assert!(table.parts().iter().all(|p| p.header_len == 0));
    }

    #[test]
    fn test_no_line_terminator() {
        let store = MemoryStore::new();
        store.put_object("b", "p1", "abc");
        store.put_object("b", "p2", "abc");

        let table = PartTable::build(&store, "b", "p*").unwrap();
        assert_eq!(table.layout(), PartLayout::Concatenated);
        assert_eq!(table.total_size(), 6);
    }

    #[test]
    fn test_header_longer_than_probe_chunk() {
        let mut header = vec![b'h'; HEADER_PROBE_CHUNK * 2 + 10];
        header.push(b'\n');
        let mut p1 = header.clone();
        p1.extend_from_slice(b"row1\n");
        let mut p2 = header.clone();
        p2.extend_from_slice(b"row2\nrow3\n");

        let store = MemoryStore::new();
        store.put_object("b", "p1", p1.clone());
        store.put_object("b", "p2", p2.clone());

        let table = PartTable::build(&store, "b", "p?").unwrap();
        assert_eq!(
            table.layout(),
            PartLayout::SharedHeader {
                header_len: header.len() as u64
            }
        );
        assert_eq!(table.total_size(), (p1.len() + p2.len() - header.len()) as u64);
    }

    #[test]
    fn test_part_equal_to_header_contributes_nothing() {
        let store = MemoryStore::new();
        store.put_object("b", "p1", "h\nrow1\n");
        store.put_object("b", "p2", "h\n");
        store.put_object("b", "p3", "h\nrow2\n");

        let table = PartTable::build(&store, "b", "p*").unwrap();
        assert_eq!(table.cumulative(), &[7, 7, 12]);
    }

    #[test]
    fn test_shorter_part_disables_dedup() {
        let store = MemoryStore::new();
        store.put_object("b", "p1", "header\nrow\n");
        store.put_object("b", "p2", "head");

        let table = PartTable::build(&store, "b", "p*").unwrap();
        assert_eq!(table.layout(), PartLayout::Concatenated);
        assert_eq!(table.total_size(), 15);
    }

    #[test]
    fn test_parts_sorted_by_key() {
        let store = MemoryStore::new();
        store.put_object("b", "part-10", "x\n10\n");
        store.put_object("b", "part-02", "x\n02\n");
        store.put_object("b", "part-01", "x\n01\n");

        let table = PartTable::build(&store, "b", "part-*").unwrap();
        let keys: Vec<_> = table.parts().iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["part-01", "part-02", "part-10"]);
    }

    #[test]
    fn test_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            PartTable::build(&store, "b", "missing*"),
            Err(VfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_failure() {
        let store = MemoryStore::new();
        store.fail_list("b");
        assert!(matches!(
            PartTable::build(&store, "b", "x"),
            Err(VfsError::Backend {
                op: BackendOp::List,
                ..
            })
        ));
    }

    #[test]
    fn test_probe_failure_on_first_part() {
        let store = MemoryStore::new();
        store.put_object("b", "mock_file_1", CONTENT_1);
        store.put_object("b", "mock_file_3", CONTENT_3);
        store.fail_reads("mock_file_1");

        assert!(matches!(
            PartTable::build(&store, "b", "mock_file_*"),
            Err(VfsError::Backend {
                op: BackendOp::Read,
                ..
            })
        ));
    }

    #[test]
    fn test_probe_failure_on_second_part() {
        let store = MemoryStore::new();
        store.put_object("b", "mock_file_1", CONTENT_1);
        store.put_object("b", "mock_file_3", CONTENT_3);
        store.fail_reads("mock_file_3");

        assert!(PartTable::build(&store, "b", "mock_file_*").is_err());
    }
}
