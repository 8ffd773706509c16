//! Atom metadata: ordered key/value pairs.
//!
//! Meta is hashed in insertion order, so it is always carried as a list and
//! only folded into a map for lookups.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::policy::PolicyMeta;
use crate::wallet::Wallet;

/// A single metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaItem {
    pub key: String,
    pub value: String,
}

impl MetaItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Build meta from pairs, keeping their order.
pub fn meta_from_pairs<I, K, V>(pairs: I) -> Vec<MetaItem>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| MetaItem::new(k, v))
        .collect()
}

/// Normalize JSON metadata into an ordered list.
///
/// Accepts either an object (`{"k": "v"}`) or an array of
/// `{"key": .., "value": ..}` objects. Null values are dropped; non-string
/// values are rendered as JSON text.
pub fn normalize_meta(meta: &Value) -> Result<Vec<MetaItem>> {
    match meta {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(k, v)| meta_value_string(v).map(|v| MetaItem::new(k.as_str(), v)))
            .collect()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let key = item
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CoreError::Encoding("meta entry without a key".into()))?;
                if let Some(value) = item.get("value").and_then(meta_value_string) {
                    out.push(MetaItem::new(key, value));
                }
            }
            Ok(out)
        }
        other => Err(CoreError::Encoding(format!(
            "meta must be an object or an array, got {other}"
        ))),
    }
}

/// Fold an ordered meta list into a map; later keys overwrite earlier ones.
pub fn aggregate_meta(meta: &[MetaItem]) -> BTreeMap<String, String> {
    meta.iter()
        .map(|item| (item.key.clone(), item.value.clone()))
        .collect()
}

fn meta_value_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Builder for the meta attached to a new atom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomMeta {
    items: Vec<MetaItem>,
}

impl AtomMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries, replacing the value of keys already present.
    pub fn merge<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = MetaItem>,
    {
        for item in items {
            match self.items.iter_mut().find(|m| m.key == item.key) {
                Some(existing) => existing.value = item.value,
                None => self.items.push(item),
            }
        }
        self
    }

    /// Set a single entry.
    pub fn set(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.merge([MetaItem::new(key, value)])
    }

    /// Attach read/write policies covering every key currently present.
    pub fn add_policy(self, policy: &PolicyMeta) -> Self {
        let keys: Vec<String> = self.items.iter().map(|m| m.key.clone()).collect();
        let filled = policy.clone().fill_default(&keys);
        self.merge(filled.to_meta_items())
    }

    /// Record the wallet that actually signs the molecule.
    ///
    /// Used when the signing key differs from the first atom's wallet.
    pub fn add_signing_wallet(self, wallet: &Wallet) -> Result<Self> {
        let snapshot = serde_json::json!({
            "tokenSlug": wallet.token,
            "bundleHash": wallet.bundle,
            "address": wallet.address,
            "position": wallet.position,
            "pubkey": wallet.pubkey,
            "characters": wallet.characters,
        });
        Ok(self.set("signingWallet", serde_json::to_string(&snapshot)?))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|m| m.key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<MetaItem> {
        self.items
    }
}

impl From<Vec<MetaItem>> for AtomMeta {
    fn from(items: Vec<MetaItem>) -> Self {
        AtomMeta::new().merge(items)
    }
}
