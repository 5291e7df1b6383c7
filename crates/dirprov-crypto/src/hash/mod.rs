//! Hash utilities

use digest::Digest;
use sha2::Sha256;

/// SHA-256 digest rendered as upper-case hex
pub fn sha256_hex_upper(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode_upper(hasher.finalize())
}
