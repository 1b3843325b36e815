//! Unit tests for packing staged snapshots

use std::fs;
use test_utils::fixtures::{tar_entries, write_snapshot};
use test_utils::TestContext;
use tsguard::utils::archive::{pack_directory, pack_directory_async};

#[test]
fn test_entries_rooted_at_directory_name() {
    let ctx = TestContext::new();
    let source = ctx.temp_dir().join("20240101T000000Z");
    let files = write_snapshot(&source);
    let archive = ctx.temp_dir().join("20240101T000000Z.tar");

    pack_directory(&source, &archive).unwrap();

    let entries = tar_entries(&archive);
    for file in files {
        let name = file.file_name().unwrap().to_string_lossy();
        assert!(
            entries.contains(&format!("20240101T000000Z/{}", name)),
            "missing {} in {:?}",
            name,
            entries
        );
    }
    assert!(entries.iter().all(|e| e.starts_with("20240101T000000Z")));
}

#[test]
fn test_source_is_left_in_place() {
    let ctx = TestContext::new();
    let source = ctx.temp_dir().join("snap");
    write_snapshot(&source);

    pack_directory(&source, &ctx.temp_dir().join("snap.tar")).unwrap();

    assert!(source.is_dir());
    assert_eq!(fs::read_dir(&source).unwrap().count(), 3);
}

#[test]
fn test_file_source_is_rejected() {
    let ctx = TestContext::new();
    let source = ctx.create_file("not-a-dir", b"x");
    let err = pack_directory(&source, &ctx.temp_dir().join("out.tar")).unwrap_err();
    assert!(err.to_string().contains("not a directory"));
}

#[tokio::test]
async fn test_empty_snapshot_still_packs() {
    let ctx = TestContext::new();
    let source = ctx.create_subdir("empty");
    let archive = ctx.temp_dir().join("empty.tar");

    pack_directory_async(source, archive.clone()).await.unwrap();

    let entries = tar_entries(&archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].trim_end_matches('/'), "empty");
}
