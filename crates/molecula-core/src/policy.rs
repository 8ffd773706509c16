//! Read/write access policies attached to metadata.
//!
//! A policy maps each meta key to the principals allowed to read or write it:
//! `all`, `self`, or a bundle hash.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{PolicyError, Result};
use crate::meta::MetaItem;
use crate::wallet::Wallet;

/// Meta keys that stay publicly writable unless a policy says otherwise.
pub const ALWAYS_PUBLIC: [&str; 2] = ["characters", "pubkey"];

/// Meta keys under which `M` atoms carry their policies.
pub const POLICY_META_KEYS: [&str; 2] = ["readPolicy", "writePolicy"];

/// Principal rules for one action: meta key -> allowed principals.
pub type PolicyRules = BTreeMap<String, Vec<String>>;

/// A normalized `{read, write}` policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMeta {
    #[serde(default)]
    pub read: PolicyRules,
    #[serde(default)]
    pub write: PolicyRules,
}

impl PolicyMeta {
    pub fn new(read: PolicyRules, write: PolicyRules) -> Self {
        Self { read, write }
    }

    /// Normalize an arbitrary JSON policy.
    ///
    /// Only `read` and `write` survive; anything else, and null sections,
    /// are dropped.
    pub fn from_value(policy: &Value) -> Result<Self> {
        let mut out = PolicyMeta::default();
        let Some(map) = policy.as_object() else {
            return Err(PolicyError::PolicyInvalid(format!("policy must be an object: {policy}")).into());
        };
        for (action, section) in map {
            let target = match action.as_str() {
                "read" => &mut out.read,
                "write" => &mut out.write,
                _ => continue,
            };
            if section.is_null() {
                continue;
            }
            *target = parse_rules(section)?;
        }
        Ok(out)
    }

    /// Back-fill defaults for every meta key the policy does not mention.
    pub fn fill_default<S: AsRef<str>>(mut self, meta_keys: &[S]) -> Self {
        for key in meta_keys.iter().map(AsRef::as_ref) {
            if POLICY_META_KEYS.contains(&key) {
                continue;
            }
            self.read
                .entry(key.to_string())
                .or_insert_with(|| vec!["all".to_string()]);
            self.write.entry(key.to_string()).or_insert_with(|| {
                if ALWAYS_PUBLIC.contains(&key) {
                    vec!["all".to_string()]
                } else {
                    vec!["self".to_string()]
                }
            });
        }
        self
    }

    /// Serialize as `{"read": {...}, "write": {...}}`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// `readPolicy` / `writePolicy` meta entries for metadata atoms.
    pub fn to_meta_items(&self) -> Vec<MetaItem> {
        let mut items = Vec::with_capacity(2);
        for (key, rules) in [("readPolicy", &self.read), ("writePolicy", &self.write)] {
            if rules.is_empty() {
                continue;
            }
            // A BTreeMap of string vectors always serializes.
            if let Ok(json) = serde_json::to_string(rules) {
                items.push(MetaItem::new(key, json));
            }
        }
        items
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// True if `value` is an acceptable policy principal.
pub fn is_valid_principal(value: &str) -> bool {
    matches!(value, "all" | "self") || Wallet::is_bundle_hash(value)
}

fn parse_rules(section: &Value) -> Result<PolicyRules> {
    let Some(map) = section.as_object() else {
        return Err(PolicyError::PolicyInvalid(format!("policy section must be an object: {section}")).into());
    };
    let mut rules = PolicyRules::new();
    for (key, principals) in map {
        let list = match principals {
            Value::Array(items) => items
                .iter()
                .map(|p| {
                    p.as_str().map(String::from).ok_or_else(|| {
                        PolicyError::PolicyInvalid(format!("principal must be a string: {p}"))
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Value::String(s) => vec![s.clone()],
            other => {
                return Err(PolicyError::PolicyInvalid(format!(
                    "principals for {key} must be a list: {other}"
                ))
                .into())
            }
        };
        rules.insert(key.clone(), list);
    }
    Ok(rules)
}
