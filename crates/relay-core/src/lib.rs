//! Foundational low-level utilities shared across relay crates.
//!
//! Provides atomic file-write helpers, timestamp helpers, and the recursive
//! directory copy/listing used by session restore and artifact bundling.

pub mod atomic_io;
pub mod fs_tree;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use fs_tree::{copy_dir_recursive, dir_is_empty, list_files_recursive};
pub use time_utils::{
    current_rfc3339_timestamp, current_unix_timestamp_ms, parse_rfc3339_to_unix_ms,
};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("sample.txt");
        write_text_atomic(&path, "hello world").expect("write");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "hello world");
    }

    #[test]
    fn unit_current_rfc3339_timestamp_parses_back() {
        let now = current_rfc3339_timestamp();
        let parsed = parse_rfc3339_to_unix_ms(&now).expect("parse timestamp");
        let now_ms = current_unix_timestamp_ms();
        assert!(parsed <= now_ms);
        assert!(parsed + 1_000 >= now_ms);
    }
}
