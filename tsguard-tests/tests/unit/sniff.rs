//! Unit tests for archive content-type detection

use rstest::rstest;
use std::fs;
use test_utils::TestContext;
use tsguard::storage::sniff::{sniff_content_type, SNIFF_LEN};
use tsguard::utils::archive::pack_directory;

#[rstest]
#[case(b"\x89PNG\r\n\x1a\nrest".to_vec(), "image/png")]
#[case(b"\xFF\xD8\xFF\xE0".to_vec(), "image/jpeg")]
#[case(b"key = \"value\"\n".to_vec(), "text/plain")]
#[case(vec![0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01, 0x00], "application/octet-stream")]
fn test_sniff_essence(#[case] data: Vec<u8>, #[case] essence: &str) {
    assert_eq!(sniff_content_type(&data).essence_str(), essence);
}

#[test]
fn test_only_leading_window_counts() {
    let mut data = vec![b'a'; SNIFF_LEN];
    data.extend_from_slice(&[0u8; 64]);
    assert_eq!(sniff_content_type(&data).essence_str(), "text/plain");
}

#[test]
fn test_real_archive_is_tar() {
    let ctx = TestContext::new();
    let source = ctx.create_subdir("20240101T000000Z");
    fs::write(source.join("manifest"), "{}").unwrap();
    let archive = ctx.temp_dir().join("20240101T000000Z.tar");
    pack_directory(&source, &archive).unwrap();

    let head = fs::read(&archive).unwrap();
    let content_type = sniff_content_type(&head);
    assert_eq!(content_type.essence_str(), "application/x-tar");
    assert!(!content_type.to_string().is_empty());
}
