//! Atom: a single monodirectional ledger operation.
//!
//! Atoms are plain records. Everything that depends on their order (the
//! molecular hash, OTS partitioning) sorts them first with [`sort_atoms`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::{aggregate_meta, MetaItem};
use crate::types::Isotope;
use crate::wallet::Wallet;

/// One ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    /// Operation type.
    pub isotope: Isotope,

    /// Signing position of the acting wallet.
    #[serde(default)]
    pub position: Option<String>,

    /// Address of the acting wallet.
    #[serde(default)]
    pub wallet_address: Option<String>,

    /// Token slug of the acting wallet.
    pub token: String,

    /// Signed amount. Negative values debit, positive values credit.
    #[serde(default)]
    pub value: Option<Decimal>,

    /// Groups atoms sharing one remainder-consistency check.
    #[serde(default)]
    pub batch_id: Option<String>,

    #[serde(default)]
    pub meta_type: Option<String>,

    #[serde(default)]
    pub meta_id: Option<String>,

    /// Ordered metadata. Order is part of the hash.
    #[serde(default)]
    pub meta: Vec<MetaItem>,

    /// Ordinal within the owning molecule, assigned on append.
    #[serde(default)]
    pub index: Option<u32>,

    /// This atom's slice of the molecule's one-time signature.
    #[serde(default)]
    pub ots_fragment: Option<String>,

    /// Creation time in Unix milliseconds.
    pub created_at: String,
}

impl Atom {
    /// Create an atom acting on behalf of `wallet`.
    pub fn create(
        isotope: Isotope,
        wallet: &Wallet,
        value: Option<Decimal>,
        meta_type: Option<&str>,
        meta_id: Option<&str>,
        meta: Vec<MetaItem>,
        batch_id: Option<String>,
    ) -> Self {
        Self {
            isotope,
            position: wallet.position.clone(),
            wallet_address: wallet.address.clone(),
            token: wallet.token.clone(),
            value: value.map(|v| v.normalize()),
            batch_id,
            meta_type: meta_type.map(String::from),
            meta_id: meta_id.map(String::from),
            meta,
            index: None,
            ots_fragment: None,
            created_at: now_millis(),
        }
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// The strings absorbed into the molecular sponge for this atom, in order.
    ///
    /// Position and wallet address always contribute (as empty strings when
    /// absent); other absent fields contribute nothing.
    pub fn hashable_values(&self) -> Vec<String> {
        let mut values = Vec::with_capacity(10 + self.meta.len() * 2);
        values.push(self.position.clone().unwrap_or_default());
        values.push(self.wallet_address.clone().unwrap_or_default());
        values.push(self.isotope.to_string());
        values.push(self.token.clone());
        if let Some(value) = &self.value {
            values.push(value.normalize().to_string());
        }
        if let Some(batch_id) = &self.batch_id {
            values.push(batch_id.clone());
        }
        if let Some(meta_type) = &self.meta_type {
            values.push(meta_type.clone());
        }
        if let Some(meta_id) = &self.meta_id {
            values.push(meta_id.clone());
        }
        for item in &self.meta {
            values.push(item.key.clone());
            values.push(item.value.clone());
        }
        if let Some(index) = self.index {
            values.push(index.to_string());
        }
        values.push(self.created_at.clone());
        values
    }

    /// Meta folded into a map, last write wins.
    pub fn aggregated_meta(&self) -> BTreeMap<String, String> {
        aggregate_meta(&self.meta)
    }

    /// The last value recorded under `key`.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .rev()
            .find(|item| item.key == key)
            .map(|item| item.value.as_str())
    }

    /// A copy with the signature fragment stripped.
    pub fn without_ots(&self) -> Self {
        Self {
            ots_fragment: None,
            ..self.clone()
        }
    }
}

/// Sort atoms by isotope priority, then by index.
pub fn sort_atoms(atoms: &mut [Atom]) {
    atoms.sort_by_key(|atom| (atom.isotope.priority(), atom.index));
}

/// Atoms of one isotope, in their current order.
pub fn atoms_by_isotope(atoms: &[Atom], isotope: Isotope) -> impl Iterator<Item = &Atom> {
    atoms.iter().filter(move |atom| atom.isotope == isotope)
}

pub(crate) fn now_millis() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string()
}
