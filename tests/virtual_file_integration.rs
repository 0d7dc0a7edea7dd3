//! Integration tests for virtual file reads, writes and queries through the driver

use objfile::{
    BackendOp, Driver, DriverConfig, MemoryStore, OpenMode, PartLayout, SeekAnchor, VfsError,
};
use std::io::Read;
use std::sync::Arc;

/// Helper to create a connected driver over an in-memory store
fn create_driver() -> (MemoryStore, Driver) {
    let store = MemoryStore::new();
    let driver = Driver::new(DriverConfig::default().with_scheme("store"));
    driver.connect(Arc::new(store.clone()));
    (store, driver)
}

fn filled(prefix: &str, total: usize, fill: u8) -> Vec<u8> {
    let mut data = prefix.as_bytes().to_vec();
    data.resize(total, fill);
    data
}

#[test]
fn test_single_object_size_and_read() {
    let (store, driver) = create_driver();
    let data: Vec<u8> = (0..100u8).collect();
    store.put_object("b", "f.txt", data);

    assert_eq!(driver.size("store://b/f.txt"), 100);
    assert!(driver.exists("store://b/f.txt"));

    let mut file = driver.open("store://b/f.txt", OpenMode::Read).unwrap();
    assert_eq!(file.seek(50, SeekAnchor::Start).unwrap(), 50);
    let mut buf = [0u8; 10];
    assert_eq!(file.read(&mut buf).unwrap(), 10);
    assert_eq!(buf.to_vec(), (50..60u8).collect::<Vec<_>>());
    file.close().unwrap();
}

#[test]
fn test_shared_header_counted_once() {
    let (store, driver) = create_driver();
    // 12-byte header "mock_header\n"
    store.put_object("b", "out/part-0", filled("mock_header\n", 26, b'x'));
    store.put_object("b", "out/part-1", "mock_header\nAB");

    assert_eq!(driver.size("store://b/out/part-*"), 28);

    let mut file = driver.open("store://b/out/part-*", OpenMode::Read).unwrap();
    assert_eq!(
        file.table().unwrap().layout(),
        PartLayout::SharedHeader { header_len: 12 }
    );

    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    let mut expected = filled("mock_header\n", 26, b'x');
    expected.extend_from_slice(b"AB");
    assert_eq!(content, expected);
}

#[test]
fn test_differing_headers_concatenated() {
    let (store, driver) = create_driver();
    store.put_object("b", "out/part-0", filled("header_one\n", 26, b'a'));
    store.put_object("b", "out/part-1", filled("header_two_xx\n", 33, b'b'));

    assert_eq!(driver.size("store://b/out/part-*"), 59);

    let mut file = driver.open("store://b/out/part-*", OpenMode::Read).unwrap();
    assert_eq!(file.table().unwrap().layout(), PartLayout::Concatenated);
    file.seek(26, SeekAnchor::Start).unwrap();
    let mut buf = [0u8; 14];
    assert_eq!(file.read(&mut buf).unwrap(), 14);
    assert_eq!(&buf, b"header_two_xx\n");
}

#[test]
fn test_unmatched_pattern() {
    let (store, driver) = create_driver();
    store.put_object("b", "other.txt", "x");

    assert_eq!(driver.size("store://b/none-*.csv"), -1);
    assert!(!driver.exists("store://b/none-*.csv"));
    assert!(matches!(
        driver.open("store://b/none-*.csv", OpenMode::Read),
        Err(VfsError::NotFound(_))
    ));
}

#[test]
fn test_probe_failure_on_first_part() {
    let (store, driver) = create_driver();
    store.put_object("b", "p/0", "h\nabc");
    store.put_object("b", "p/1", "h\ndef");
    store.fail_reads("p/0");

    assert_eq!(driver.size("store://b/p/*"), -1);
    assert!(matches!(
        driver.try_size("store://b/p/*"),
        Err(VfsError::Backend {
            op: BackendOp::Read,
            ..
        })
    ));
}

#[test]
fn test_probe_failure_on_second_part() {
    let (store, driver) = create_driver();
    store.put_object("b", "p/0", "h\nabc");
    store.put_object("b", "p/1", "h\ndef");
    store.fail_reads("p/1");

    assert_eq!(driver.size("store://b/p/*"), -1);
}

#[test]
fn test_seek_then_read_matches_sequential_read() {
    let (store, driver) = create_driver();
    store.put_object("b", "s/0", "id,value\n1,one\n2,two\n");
    store.put_object("b", "s/1", "id,value\n3,three\n");
    store.put_object("b", "s/2", "id,value\n4,four\n5,five\n");

    let mut whole = Vec::new();
    driver
        .open("store://b/s/*", OpenMode::Read)
        .unwrap()
        .read_to_end(&mut whole)
        .unwrap();
    assert_eq!(whole.len() as i64, driver.size("store://b/s/*"));
    assert!(whole.starts_with(b"id,value\n1,one\n"));
    assert_eq!(whole.windows(9).filter(|&w| w == &b"id,value\n"[..]).count(), 1);

    let mut file = driver.open("store://b/s/*", OpenMode::Read).unwrap();
    for start in 0..whole.len() {
        file.seek(start as i64, SeekAnchor::Start).unwrap();
        let mut byte = [0u8; 1];
        assert_eq!(file.read(&mut byte).unwrap(), 1);
        assert_eq!(byte[0], whole[start], "mismatch at offset {}", start);
    }
}

#[test]
fn test_negative_seek_rejected_for_every_anchor() {
    let (store, driver) = create_driver();
    store.put_object("b", "f.txt", vec![7u8; 20]);
    let mut file = driver.open("store://b/f.txt", OpenMode::Read).unwrap();
    file.seek(5, SeekAnchor::Start).unwrap();

    for (offset, anchor) in [
        (-1, SeekAnchor::Start),
        (-6, SeekAnchor::Current),
        (-21, SeekAnchor::End),
    ] {
        assert!(matches!(
            file.seek(offset, anchor),
            Err(VfsError::InvalidSeek(_))
        ));
        assert_eq!(file.position().unwrap(), 5);
    }
}

#[test]
fn test_read_at_or_past_eof_returns_zero() {
    let (store, driver) = create_driver();
    store.put_object("b", "f.txt", vec![1u8; 10]);
    let mut file = driver.open("store://b/f.txt", OpenMode::Read).unwrap();
    let mut buf = [0u8; 4];

    file.seek(0, SeekAnchor::End).unwrap();
    assert_eq!(file.read(&mut buf).unwrap(), 0);
    file.seek(25, SeekAnchor::End).unwrap();
    assert_eq!(file.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_write_then_read_back() {
    let (store, driver) = create_driver();
    let mut file = driver.open("store://b/new/out.txt", OpenMode::Write).unwrap();
    file.write(b"first,").unwrap();
    file.write(b"second").unwrap();
    assert!(!driver.exists("store://b/new/out.txt"));
    file.close().unwrap();

    assert_eq!(store.get_object("b", "new/out.txt").unwrap(), b"first,second");
    assert_eq!(driver.size("store://b/new/out.txt"), 12);
}

#[test]
fn test_write_overwrites_existing_object() {
    let (store, driver) = create_driver();
    store.put_object("b", "f.txt", "old content");

    let mut file = driver.open("store://b/f.txt", OpenMode::Write).unwrap();
    file.write(b"new").unwrap();
    file.close().unwrap();
    assert_eq!(store.get_object("b", "f.txt").unwrap(), b"new");
}

#[test]
fn test_finalize_failure_publishes_nothing() {
    let (store, driver) = create_driver();
    store.fail_finalize("f.txt");

    let mut file = driver.open("store://b/f.txt", OpenMode::Write).unwrap();
    file.write(b"data").unwrap();
    assert!(matches!(
        file.close(),
        Err(VfsError::Backend {
            op: BackendOp::Finalize,
            ..
        })
    ));
    assert!(!driver.exists("store://b/f.txt"));
}

#[test]
fn test_close_twice() {
    let (store, driver) = create_driver();
    store.put_object("b", "f.txt", "x");
    let mut file = driver.open("store://b/f.txt", OpenMode::Read).unwrap();
    file.close().unwrap();
    assert!(matches!(file.close(), Err(VfsError::UseAfterClose)));
}

#[test]
fn test_operations_after_disconnect() {
    let (store, driver) = create_driver();
    store.put_object("b", "f.txt", "hello");
    let mut file = driver.open("store://b/f.txt", OpenMode::Read).unwrap();

    driver.disconnect();
    let mut buf = [0u8; 5];
    assert!(matches!(file.read(&mut buf), Err(VfsError::Disconnected)));
    assert!(matches!(file.size(), Err(VfsError::Disconnected)));
    assert!(matches!(
        driver.open("store://b/f.txt", OpenMode::Read),
        Err(VfsError::NotConnected)
    ));
    assert_eq!(driver.size("store://b/f.txt"), -1);
    assert!(!driver.exists("store://b/f.txt"));
}

#[test]
fn test_invalid_paths() {
    let (_store, driver) = create_driver();
    assert!(matches!(
        driver.open("gs://b/f.txt", OpenMode::Read),
        Err(VfsError::InvalidUri(_))
    ));
    assert!(matches!(
        driver.open("store://b", OpenMode::Read),
        Err(VfsError::InvalidUri(_))
    ));
    assert!(matches!(
        driver.open("store:///f.txt", OpenMode::Read),
        Err(VfsError::MissingBucket(_))
    ));
    assert!(matches!(OpenMode::try_from('a'), Err(VfsError::InvalidMode(_))));
}
