#![no_main]
use libfuzzer_sys::fuzz_target;
use objfile::{KeyPattern, ObjectUri};

// Arbitrary paths and glob patterns must parse or fail cleanly
fuzz_target!(|data: (&str, &str)| {
    let (path, key) = data;

    if let Ok(uri) = ObjectUri::resolve(path, "gs", Some("default")) {
        assert!(!uri.bucket.is_empty());
        assert!(!uri.pattern.is_empty());
    }

    if let Ok(pattern) = KeyPattern::new(path) {
        let _ = pattern.matches(key);
        if pattern.is_literal() {
            assert_eq!(pattern.matches(key), path == key);
        }
        assert!(path.starts_with(pattern.literal_prefix()));
    }
});
