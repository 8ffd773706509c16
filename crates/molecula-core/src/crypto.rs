//! Cryptographic primitives for Molecula.
//!
//! Everything is built on SHAKE256. Digests travel as lowercase hex strings,
//! which is also the form that gets absorbed when digests are chained.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use num_bigint::BigUint;
use rand::Rng;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use std::fmt;

use crate::error::{CoreError, Result};

const HEX_ALPHABET: &[u8] = b"0123456789abcdef";

/// Length of a secret, in hex characters.
pub const SECRET_LENGTH: usize = 2048;

/// Length of a bundle hash, wallet address or position, in hex characters.
pub const DIGEST_LENGTH: usize = 64;

/// An explicit SHAKE256 sponge.
///
/// Absorbing twice into one sponge is not the same as hashing twice; key
/// derivation depends on the difference, so the state is kept visible.
#[derive(Clone, Default)]
pub struct Shake256Sponge {
    state: Shake256,
}

impl Shake256Sponge {
    /// Start a fresh sponge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb more input into the sponge.
    pub fn absorb(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.state.update(data.as_ref());
        self
    }

    /// Finish absorbing and squeeze `bits` of output as hex.
    pub fn squeeze(self, bits: usize) -> String {
        let mut reader = self.state.finalize_xof();
        let mut out = vec![0u8; bits / 8];
        reader.read(&mut out);
        hex::encode(out)
    }
}

impl fmt::Debug for Shake256Sponge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Shake256Sponge")
    }
}

/// One-shot SHAKE256, returning `bits / 4` hex characters.
pub fn shake256(input: impl AsRef<[u8]>, bits: usize) -> String {
    let mut sponge = Shake256Sponge::new();
    sponge.absorb(input);
    sponge.squeeze(bits)
}

/// Derive a 2048-character secret from a seed phrase.
pub fn generate_secret(seed: &str) -> String {
    shake256(seed, SECRET_LENGTH * 4)
}

/// Generate a random 2048-character secret.
pub fn random_secret() -> String {
    random_hex(SECRET_LENGTH)
}

/// Hash a secret into the bundle identifier shared by all of its wallets.
pub fn generate_bundle_hash(secret: &str) -> String {
    shake256(secret, 256)
}

/// Generate a batch id.
///
/// Deterministic when both the molecular hash and an atom index are known,
/// random otherwise.
pub fn generate_batch_id(molecular_hash: Option<&str>, index: Option<u32>) -> String {
    match (molecular_hash, index) {
        (Some(hash), Some(index)) => generate_bundle_hash(&format!("{hash}{index}")),
        _ => random_hex(DIGEST_LENGTH),
    }
}

/// Cryptographically random string over the hex alphabet.
pub fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| HEX_ALPHABET[rng.gen_range(0..HEX_ALPHABET.len())] as char)
        .collect()
}

/// True if every character is a hex digit.
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Add two hex-encoded big integers, rendering the sum as lowercase hex.
pub fn add_hex(a: &str, b: &str) -> Result<String> {
    let a = parse_hex_int(a)?;
    let b = parse_hex_int(b)?;
    Ok((a + b).to_str_radix(16))
}

/// Re-encode a hex number in base 17 (`0-9a-g`), left-padded to `width`.
pub fn hex_to_base17(hex: &str, width: usize) -> Result<String> {
    let digits = parse_hex_int(hex)?.to_str_radix(17);
    Ok(format!("{digits:0>width$}"))
}

/// Compress a hex string to base64.
pub fn hex_to_base64(hex: &str) -> Result<String> {
    let bytes = hex::decode(hex).map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(BASE64.encode(bytes))
}

/// Expand a base64 string back to hex.
pub fn base64_to_hex(b64: &str) -> Result<String> {
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(hex::encode(bytes))
}

fn parse_hex_int(s: &str) -> Result<BigUint> {
    BigUint::parse_bytes(s.as_bytes(), 16)
        .ok_or_else(|| CoreError::Encoding(format!("not a hex number: {:.16}", s)))
}
