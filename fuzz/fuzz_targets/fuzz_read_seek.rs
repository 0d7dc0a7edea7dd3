#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use objfile::{Driver, DriverConfig, MemoryStore, OpenMode, SeekAnchor};
use std::sync::Arc;

#[derive(Debug, Arbitrary)]
enum Op {
    Seek { offset: i64, anchor: u8 },
    Read { len: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    parts: Vec<Vec<u8>>,
    ops: Vec<Op>,
}

// Random parts and random seek/read sequences must never panic, and reads
// must stay consistent with the reported size
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);
    let input: Input = match u.arbitrary() {
        Ok(input) => input,
        Err(_) => return,
    };
    if input.parts.is_empty() {
        return;
    }

    let store = MemoryStore::new();
    for (i, data) in input.parts.iter().take(8).enumerate() {
        store.put_object("fuzz", &format!("p/{:02}", i), data.clone());
    }
    let driver = Driver::new(DriverConfig::default().with_scheme("fuzz"));
    driver.connect(Arc::new(store));

    let size = driver.size("fuzz://fuzz/p/*");
    assert!(size >= 0);

    let mut file = match driver.open("fuzz://fuzz/p/*", OpenMode::Read) {
        Ok(file) => file,
        Err(_) => return,
    };

    for op in input.ops.iter().take(64) {
        match op {
            Op::Seek { offset, anchor } => {
                let anchor = match anchor % 3 {
                    0 => SeekAnchor::Start,
                    1 => SeekAnchor::Current,
                    _ => SeekAnchor::End,
                };
                let before = file.position().unwrap();
                if file.seek(*offset, anchor).is_err() {
                    assert_eq!(file.position().unwrap(), before);
                }
            }
            Op::Read { len } => {
                let pos = file.position().unwrap();
                let mut buf = vec![0u8; *len as usize];
                let n = file.read(&mut buf).unwrap();
                assert!(pos + n as u64 <= (size as u64).max(pos));
            }
        }
    }

    file.close().unwrap();
});
