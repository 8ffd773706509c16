//! Wallets and deterministic key derivation.
//!
//! A wallet is one signing position of one token under one secret. Its
//! private key and address are pure functions of `(secret, token, position)`.
//!
//! ## Derivation
//!
//! - key: `secret + position` (as big integers) and the token are absorbed
//!   into one sponge and squeezed to 8192 bits; that output is absorbed into
//!   a second sponge and squeezed to 8192 bits again.
//! - address: each of the 16 key fragments is hashed 16 times at 512 bits;
//!   the concatenation is squeezed to 8192 bits, then to 256 bits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::crypto::{
    add_hex, generate_batch_id, generate_bundle_hash, generate_secret, is_hex, random_hex,
    random_secret, shake256, Shake256Sponge, DIGEST_LENGTH,
};
use crate::error::{CredentialError, Result};
use crate::meta::MetaItem;

/// Number of hex characters in one key fragment.
pub const KEY_FRAGMENT_LENGTH: usize = 128;

/// Hash iterations applied to each key fragment to reach the public address.
pub const ADDRESS_ITERATIONS: usize = 16;

/// Default character set tag for new wallets.
pub const DEFAULT_CHARACTERS: &str = "BASE64";

/// The caller's secret. Never serialized, redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap an existing hex secret.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if !is_hex(&secret) {
            return Err(CredentialError::Malformed {
                field: "secret",
                reason: "expected a non-empty hex string".into(),
            }
            .into());
        }
        Ok(Self(secret.to_ascii_lowercase()))
    }

    /// Derive a secret from a seed phrase.
    pub fn from_seed(seed: &str) -> Self {
        Self(generate_secret(seed))
    }

    /// Generate a random secret.
    pub fn random() -> Self {
        Self(random_secret())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bundle hash identifying every wallet of this secret.
    pub fn bundle_hash(&self) -> String {
        generate_bundle_hash(&self.0)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// A unit of a non-fungible or stackable token held by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUnit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metas: Vec<MetaItem>,
}

/// A ledger wallet.
///
/// Serializing a wallet yields its public snapshot: the private key is
/// skipped and no secret is ever stored.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub token: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub characters: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub token_units: Vec<TokenUnit>,
    #[serde(default)]
    pub trade_rates: BTreeMap<String, Decimal>,
    #[serde(skip)]
    key: Option<String>,
}

impl Wallet {
    /// Derive the wallet of `secret` for `token` at `position`.
    ///
    /// A fresh random position is drawn when none is given.
    pub fn new(secret: &Secret, token: &str, position: Option<&str>) -> Result<Self> {
        let position = match position {
            Some(p) => {
                validate_digest("position", p)?;
                p.to_ascii_lowercase()
            }
            None => generate_position(),
        };
        let key = generate_key(secret.as_str(), token, &position)?;
        let address = generate_address(&key);

        Ok(Self {
            token: token.to_string(),
            balance: Decimal::ZERO,
            position: Some(position),
            address: Some(address),
            bundle: Some(secret.bundle_hash()),
            batch_id: None,
            characters: Some(DEFAULT_CHARACTERS.to_string()),
            pubkey: None,
            token_units: Vec::new(),
            trade_rates: BTreeMap::new(),
            key: Some(key),
        })
    }

    /// Derive a wallet at a fresh random position.
    pub fn create(secret: &Secret, token: &str) -> Result<Self> {
        Self::new(secret, token, None)
    }

    /// A wallet known only by bundle and token, not yet bound to a position.
    pub fn shadow(bundle: &str, token: &str) -> Result<Self> {
        validate_digest("bundle", bundle)?;
        Ok(Self {
            token: token.to_string(),
            balance: Decimal::ZERO,
            position: None,
            address: None,
            bundle: Some(bundle.to_ascii_lowercase()),
            batch_id: None,
            characters: None,
            pubkey: None,
            token_units: Vec::new(),
            trade_rates: BTreeMap::new(),
            key: None,
        })
    }

    /// Rebuild a wallet from identifiers reported by the ledger.
    pub fn from_ledger(
        token: &str,
        bundle: Option<&str>,
        position: Option<&str>,
        address: Option<&str>,
        balance: Decimal,
    ) -> Result<Self> {
        let wallet = Self {
            token: token.to_string(),
            balance,
            position: position.map(str::to_ascii_lowercase),
            address: address.map(str::to_ascii_lowercase),
            bundle: bundle.map(str::to_ascii_lowercase),
            batch_id: None,
            characters: None,
            pubkey: None,
            token_units: Vec::new(),
            trade_rates: BTreeMap::new(),
            key: None,
        };
        wallet.validate()?;
        Ok(wallet)
    }

    /// Check the format of every identifier present.
    pub fn validate(&self) -> Result<()> {
        if let Some(position) = &self.position {
            validate_digest("position", position)?;
        }
        if let Some(address) = &self.address {
            validate_digest("address", address)?;
        }
        if let Some(bundle) = &self.bundle {
            validate_digest("bundle", bundle)?;
        }
        Ok(())
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_characters(mut self, characters: impl Into<String>) -> Self {
        self.characters = Some(characters.into());
        self
    }

    pub fn with_pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = Some(pubkey.into());
        self
    }

    /// Derive the wallet that receives what is left after a full-balance spend.
    pub fn create_remainder(&self, secret: &Secret) -> Result<Self> {
        let mut remainder = Self::create(secret, &self.token)?;
        remainder.characters = self.characters.clone();
        remainder.init_batch_id(self, true);
        Ok(remainder)
    }

    /// Assign a batch id relative to `source`.
    ///
    /// Remainders continue the source's batch; other wallets start a new one.
    /// Nothing happens when the source carries no batch id.
    pub fn init_batch_id(&mut self, source: &Wallet, is_remainder: bool) {
        if let Some(batch_id) = &source.batch_id {
            self.batch_id = Some(if is_remainder {
                batch_id.clone()
            } else {
                generate_batch_id(None, None)
            });
        }
    }

    /// A shadow wallet has no position and no address yet.
    pub fn is_shadow(&self) -> bool {
        self.position.is_none() && self.address.is_none()
    }

    /// The derived private key, when the wallet was built from a secret.
    pub fn private_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// True if `code` has the shape of a bundle hash.
    pub fn is_bundle_hash(code: &str) -> bool {
        code.len() == DIGEST_LENGTH && is_hex(code)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("token", &self.token)
            .field("balance", &self.balance)
            .field("position", &self.position)
            .field("address", &self.address)
            .field("bundle", &self.bundle)
            .field("batch_id", &self.batch_id)
            .finish_non_exhaustive()
    }
}

/// A random 64-character signing position.
pub fn generate_position() -> String {
    random_hex(DIGEST_LENGTH)
}

/// Derive the 2048-character private key for `(secret, token, position)`.
pub fn generate_key(secret: &str, token: &str, position: &str) -> Result<String> {
    let indexed_key = add_hex(secret, position)?;

    let mut intermediate_sponge = Shake256Sponge::new();
    intermediate_sponge.absorb(&indexed_key);
    if !token.is_empty() {
        intermediate_sponge.absorb(token);
    }
    let intermediate_key = intermediate_sponge.squeeze(8192);

    let mut key_sponge = Shake256Sponge::new();
    key_sponge.absorb(&intermediate_key);
    Ok(key_sponge.squeeze(8192))
}

/// Derive the 64-character public address of a private key.
pub fn generate_address(key: &str) -> String {
    let mut digest_input = String::with_capacity(key.len());
    for fragment in key_fragments(key) {
        let mut working = fragment.to_string();
        for _ in 0..ADDRESS_ITERATIONS {
            working = shake256(&working, 512);
        }
        digest_input.push_str(&working);
    }
    address_from_digest_input(&digest_input)
}

/// Final two squeezes shared by address generation and signature checks.
pub(crate) fn address_from_digest_input(input: &str) -> String {
    let digest = shake256(input, 8192);
    shake256(digest, 256)
}

/// Split a hex key or signature into its 128-character fragments.
pub(crate) fn key_fragments(key: &str) -> impl Iterator<Item = &str> {
    key.as_bytes()
        .chunks(KEY_FRAGMENT_LENGTH)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
}

fn validate_digest(field: &'static str, value: &str) -> Result<()> {
    if value.len() != DIGEST_LENGTH || !is_hex(value) {
        return Err(CredentialError::Malformed {
            field,
            reason: format!("expected {DIGEST_LENGTH} hex characters, got {:?}", value),
        }
        .into());
    }
    Ok(())
}
