//! Winternitz-style one-time signatures over the molecular hash.
//!
//! The molecular hash is enumerated into signed integers in `[-8, 8]` and
//! normalized to sum to zero. Signing hashes each of the 16 key fragments
//! `8 - n[i]` times; verification hashes each signature fragment a further
//! `8 + n[i]` times, for 16 iterations in total, which is exactly how a
//! wallet address is derived from its key.

use crate::crypto::{base64_to_hex, hex_to_base64, is_hex, shake256, SECRET_LENGTH};
use crate::error::{CoreError, Result, SignatureError};
use crate::wallet::{address_from_digest_input, key_fragments, KEY_FRAGMENT_LENGTH};

/// Number of key fragments in a signature.
pub const FRAGMENT_COUNT: usize = SECRET_LENGTH / KEY_FRAGMENT_LENGTH;

/// Map one base-17 hash character to its signed value.
fn enumerate_char(c: char) -> Option<i8> {
    let digit = c.to_digit(17)?;
    // `to_digit` accepts uppercase too; the hash alphabet is lowercase only.
    if c.is_ascii_uppercase() {
        return None;
    }
    Some(digit as i8 - 8)
}

/// Map every character of a molecular hash to `[-8, 8]`.
///
/// `0` maps to -8, `9` to 1, `a` to 2 and `g` to 8.
pub fn enumerate(hash: &str) -> Result<Vec<i8>> {
    hash.chars()
        .map(|c| {
            enumerate_char(c).ok_or_else(|| {
                CoreError::from(SignatureError::Malformed(format!(
                    "invalid molecular hash character {c:?}"
                )))
            })
        })
        .collect()
}

/// Adjust entries one step at a time until the total is zero.
///
/// The direction is fixed by the sign of the starting total. Each pass scans
/// entries in ascending index order and moves every entry that still has room
/// towards the cap, stopping as soon as the total reaches zero.
pub fn normalize(mut values: Vec<i8>) -> Vec<i8> {
    let mut total: i32 = values.iter().map(|&v| i32::from(v)).sum();
    let raise = total < 0;

    while total != 0 {
        let mut moved = false;
        for value in values.iter_mut() {
            let has_room = if raise { *value < 8 } else { *value > -8 };
            if !has_room {
                continue;
            }
            if raise {
                *value += 1;
                total += 1;
            } else {
                *value -= 1;
                total -= 1;
            }
            moved = true;
            if total == 0 {
                break;
            }
        }
        if !moved {
            break;
        }
    }
    values
}

/// Enumerate and normalize a molecular hash.
pub fn normalized_hash(hash: &str) -> Result<Vec<i8>> {
    Ok(normalize(enumerate(hash)?))
}

/// Sign with a 2048-character private key.
pub fn sign(key: &str, normalized: &[i8]) -> Result<String> {
    check_shape(key, normalized)?;
    Ok(chain(key, normalized, |n| 8 - i32::from(n)))
}

/// Recover the signer's address from a 2048-character signature.
pub fn signature_address(signature: &str, normalized: &[i8]) -> Result<String> {
    check_shape(signature, normalized)?;
    let digest_input = chain(signature, normalized, |n| 8 + i32::from(n));
    Ok(address_from_digest_input(&digest_input))
}

fn chain(input: &str, normalized: &[i8], iterations: impl Fn(i8) -> i32) -> String {
    let mut out = String::with_capacity(SECRET_LENGTH);
    for (fragment, &n) in key_fragments(input).zip(normalized) {
        let mut working = fragment.to_string();
        for _ in 0..iterations(n) {
            working = shake256(&working, 512);
        }
        out.push_str(&working);
    }
    out
}

fn check_shape(input: &str, normalized: &[i8]) -> Result<()> {
    if input.len() != SECRET_LENGTH || !is_hex(input) {
        return Err(SignatureError::Malformed(format!(
            "expected {SECRET_LENGTH} hex characters, got {}",
            input.len()
        ))
        .into());
    }
    if normalized.len() < FRAGMENT_COUNT {
        return Err(SignatureError::Malformed(format!(
            "normalized hash too short: {}",
            normalized.len()
        ))
        .into());
    }
    Ok(())
}

/// Split a signature into one fragment per atom.
///
/// The chunk size is `ceil(len / atom_count)`, rounded up to even when
/// compressing so every chunk is whole bytes. Atoms past the end of the
/// signature receive an empty fragment.
pub fn chunk_signature(signature: &str, atom_count: usize, compressed: bool) -> Result<Vec<String>> {
    if atom_count == 0 {
        return Err(SignatureError::Malformed("no atoms to carry the signature".into()).into());
    }
    let mut chunk_size = signature.len().div_ceil(atom_count);
    if compressed && chunk_size % 2 == 1 {
        chunk_size += 1;
    }
    let mut fragments = signature
        .as_bytes()
        .chunks(chunk_size.max(1))
        .map(|chunk| {
            let chunk = std::str::from_utf8(chunk)
                .map_err(|e| SignatureError::Malformed(e.to_string()))?;
            if compressed {
                hex_to_base64(chunk)
            } else {
                Ok(chunk.to_string())
            }
        })
        .collect::<Result<Vec<String>>>()?;
    fragments.resize(atom_count, String::new());
    Ok(fragments)
}

/// Reassemble a signature from atom fragments, in atom order.
///
/// Fragments that already concatenate to a full hex signature are taken as
/// is; otherwise each fragment is decoded from base64.
pub fn assemble_signature<'a, I>(fragments: I) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let fragments: Vec<&str> = fragments.into_iter().collect();
    let joined: String = fragments.concat();
    if joined.len() == SECRET_LENGTH && is_hex(&joined) {
        return Ok(joined);
    }

    let mut decoded = String::with_capacity(SECRET_LENGTH);
    for fragment in fragments {
        let hex = base64_to_hex(fragment)
            .map_err(|e| SignatureError::Malformed(format!("undecodable fragment: {e}")))?;
        decoded.push_str(&hex);
    }
    if decoded.len() != SECRET_LENGTH {
        return Err(SignatureError::Malformed(format!(
            "signature is {} characters after decoding",
            decoded.len()
        ))
        .into());
    }
    Ok(decoded)
}
