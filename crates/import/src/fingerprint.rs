use sha2::{Digest, Sha256};

use crate::extract::StatementSource;

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Audit fingerprint of the ingested document as lowercase hex.
///
/// Text sources hash their raw bytes. Region sources hash every fragment in
/// page then region order, with the page number and region name framing each
/// fragment so that moving text between regions changes the digest.
pub fn source_digest(source: &StatementSource<'_>) -> String {
    match source {
        StatementSource::Text(text) | StatementSource::Delimited { text, .. } => {
            to_hex(&sha256_bytes(text.as_bytes()))
        }
        StatementSource::Regions { pages, amount_type } => {
            let mut hasher = Sha256::new();
            hasher.update(format!("{amount_type:?}\n").as_bytes());
            for page in pages.iter() {
                for (kind, text) in &page.fragments {
                    hasher.update(format!("{}:{kind}:{}\n", page.page, text.len()).as_bytes());
                    hasher.update(text.as_bytes());
                }
            }
            let digest: [u8; 32] = hasher.finalize().into();
            to_hex(&digest)
        }
    }
}
