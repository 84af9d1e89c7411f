use super::{rotate_log_if_needed, MAX_LOG_SIZE};
use std::io::Write;

fn write_bytes(path: &std::path::Path, size: u64) {
    let mut f = std::fs::File::create(path).unwrap();
    let buf = vec![b'x'; size as usize];
    f.write_all(&buf).unwrap();
}

fn len(path: std::path::PathBuf) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn rotate_skips_small_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("fqd.log");
    write_bytes(&log, 1024);

    rotate_log_if_needed(&log);

    assert!(log.exists(), "small log should not be rotated");
    assert!(!dir.path().join("fqd.log.1").exists());
}

#[test]
fn rotate_moves_large_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("fqd.log");
    write_bytes(&log, MAX_LOG_SIZE + 1);

    rotate_log_if_needed(&log);

    assert!(!log.exists(), "original should be renamed");
    assert_eq!(len(dir.path().join("fqd.log.1")), MAX_LOG_SIZE + 1);
}

#[test]
fn rotate_shifts_existing_rotations() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("fqd.log");
    write_bytes(&dir.path().join("fqd.log.1"), 100);
    write_bytes(&dir.path().join("fqd.log.2"), 200);
    write_bytes(&log, MAX_LOG_SIZE + 1);

    rotate_log_if_needed(&log);

    assert!(!log.exists());
    assert_eq!(len(dir.path().join("fqd.log.1")), MAX_LOG_SIZE + 1);
    assert_eq!(len(dir.path().join("fqd.log.2")), 100);
    assert_eq!(len(dir.path().join("fqd.log.3")), 200);
}

#[test]
fn rotate_drops_oldest_when_full() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("fqd.log");
    write_bytes(&dir.path().join("fqd.log.1"), 100);
    write_bytes(&dir.path().join("fqd.log.2"), 200);
    write_bytes(&dir.path().join("fqd.log.3"), 300);
    write_bytes(&log, MAX_LOG_SIZE + 1);

    rotate_log_if_needed(&log);

    assert!(!log.exists());
    // .3 is now the old .2, the old .3 is gone
    assert_eq!(len(dir.path().join("fqd.log.3")), 200);
    assert!(!dir.path().join("fqd.log.4").exists());
}

#[test]
fn rotate_noop_when_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("fqd.log");

    rotate_log_if_needed(&log);
    assert!(!log.exists());
}
