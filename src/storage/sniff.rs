//! Content-type detection from leading bytes

use mime::Mime;

/// Only this many leading bytes are considered
pub const SNIFF_LEN: usize = 512;

const TAR_MAGIC_OFFSET: usize = 257;

/// Guess a content type from the start of `data`
///
/// Unknown binary content is `application/octet-stream`; content free of
/// binary control bytes is treated as UTF-8 text.
///
/// The `ustar` check at offset 257 goes beyond the WHATWG sniffing table,
/// which has no tar signature and reports tar archives as
/// `application/octet-stream`. Uploaded archives are therefore labelled
/// `application/x-tar`.
pub fn sniff_content_type(data: &[u8]) -> Mime {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if head.starts_with(b"%PDF-") {
        return mime::APPLICATION_PDF;
    }
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return mime::IMAGE_PNG;
    }
    if head.starts_with(b"\xFF\xD8\xFF") {
        return mime::IMAGE_JPEG;
    }
    if head.starts_with(b"\x1F\x8B\x08") {
        return parsed("application/x-gzip");
    }
    if head.starts_with(b"PK\x03\x04") {
        return parsed("application/zip");
    }
    if head.len() >= TAR_MAGIC_OFFSET + 5 && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar" {
        return parsed("application/x-tar");
    }

    if head.iter().any(|b| is_binary_byte(*b)) {
        mime::APPLICATION_OCTET_STREAM
    } else {
        mime::TEXT_PLAIN_UTF_8
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn parsed(essence: &str) -> Mime {
    essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}
