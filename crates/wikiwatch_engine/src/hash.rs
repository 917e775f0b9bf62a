use sha2::{Digest, Sha256};

use crate::extract::diff_container_html;

/// Content hash of a diff page: SHA-256 hex over the serialized diff
/// container, falling back to the whole document when the container is
/// missing so a malformed page still yields a stable dedup token.
pub fn content_hash(page_html: &str) -> String {
    let subject = diff_container_html(page_html).unwrap_or_else(|| page_html.to_string());
    let digest = Sha256::digest(subject.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
