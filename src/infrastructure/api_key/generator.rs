//! API key generation and identifier hashing
//!
//! Generates cryptographically secure base62 keys and the hashed
//! identifiers used in logs and metric labels so raw keys never leave the
//! process.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of 62 that fits in a byte; bytes at or above it are
/// rejected to avoid modulo bias.
const MAX_MULTIPLE: u8 = (256 / CHARSET.len() * CHARSET.len()) as u8;

/// Generate a random ASCII key of `length` symbols sampled uniformly from
/// `[A-Za-z0-9]` via rejection sampling.
pub fn generate_key(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(length);
    let mut buffer = vec![0u8; length];

    while out.len() < length {
        rng.fill_bytes(&mut buffer);
        for &b in &buffer {
            if b >= MAX_MULTIPLE {
                continue;
            }
            out.push(CHARSET[(b % CHARSET.len() as u8) as usize]);
            if out.len() == length {
                break;
            }
        }
    }

    // The charset is ASCII, so the bytes are always valid UTF-8.
    String::from_utf8(out).expect("base62 charset is ascii")
}

/// Stable identifier for log and metric fields: the first `prefix_len`
/// characters of the base64url-unpadded SHA-256 of `value`.
pub fn hash_identifier(value: &str, prefix_len: usize) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut encoded = URL_SAFE_NO_PAD.encode(digest);
    if prefix_len > 0 && prefix_len < encoded.len() {
        encoded.truncate(prefix_len);
    }
    encoded
}
