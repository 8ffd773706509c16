//! Molecule: the signed transaction unit.
//!
//! A molecule is built against a source wallet, filled with atoms by one of
//! the `init_*` builders, then signed. Signing computes the molecular hash
//! and spreads a one-time signature across the atoms' `ots_fragment`s.
//!
//! Atoms are kept sorted after every insertion and any insertion clears the
//! molecular hash, so a molecule is either freshly signed or unsigned.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::atom::{atoms_by_isotope, now_millis, sort_atoms, Atom};
use crate::canonical::hash_atoms;
use crate::error::{CredentialError, PolicyError, Result, StructureError, TransferError};
use crate::meta::{AtomMeta, MetaItem};
use crate::ots::{chunk_signature, normalized_hash, sign};
use crate::policy::PolicyMeta;
use crate::rule::Rule;
use crate::types::{Isotope, IDENTITY_TOKEN};
use crate::validation::CheckMolecule;
use crate::wallet::{generate_key, Secret, Wallet};

/// Options for [`Molecule::sign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOptions {
    /// Leave the molecule without a bundle.
    pub anonymous: bool,
    /// Spread the signature as base64 instead of hex.
    pub compressed: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            anonymous: false,
            compressed: true,
        }
    }
}

/// A transaction: an ordered, signed collection of atoms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Molecule {
    #[serde(default)]
    pub status: Option<String>,

    /// Digest over all atoms. `None` until signed.
    #[serde(default)]
    pub molecular_hash: Option<String>,

    pub created_at: String,

    #[serde(default)]
    pub cell_slug: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    /// Bundle hash of the signer.
    #[serde(default)]
    pub bundle: Option<String>,

    atoms: Vec<Atom>,

    /// Public snapshot of the wallet being debited.
    #[serde(default)]
    pub source_wallet: Option<Wallet>,

    /// Public snapshot of the wallet receiving the remainder.
    #[serde(default)]
    pub remainder_wallet: Option<Wallet>,

    #[serde(skip)]
    secret: Option<Secret>,
}

impl Molecule {
    /// Start a molecule signed by `secret` and spending from `source_wallet`.
    ///
    /// A remainder wallet for the same token is derived at a fresh position.
    pub fn new(secret: Secret, source_wallet: Wallet) -> Result<Self> {
        let remainder = source_wallet.create_remainder(&secret)?;
        Ok(Self {
            status: None,
            molecular_hash: None,
            created_at: now_millis(),
            cell_slug: None,
            version: None,
            bundle: Some(secret.bundle_hash()),
            atoms: Vec::new(),
            source_wallet: Some(source_wallet),
            remainder_wallet: Some(remainder),
            secret: Some(secret),
        })
    }

    /// Replace the derived remainder wallet.
    pub fn with_remainder(mut self, remainder: Wallet) -> Self {
        self.remainder_wallet = Some(remainder);
        self
    }

    pub fn with_cell_slug(mut self, cell_slug: impl Into<String>) -> Self {
        self.cell_slug = Some(cell_slug.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Fix the timestamp stamped on every atom added from now on.
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// Atoms in sorted order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Atoms of one isotope, in sorted order.
    pub fn isotopes(&self, isotope: Isotope) -> impl Iterator<Item = &Atom> {
        atoms_by_isotope(&self.atoms, isotope)
    }

    /// True once a secret is attached, so the molecule can be signed.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Append an atom.
    ///
    /// The atom's index becomes the current atom count, the molecular hash
    /// is cleared and the atom list is re-sorted.
    pub fn add_atom(&mut self, mut atom: Atom) -> &mut Self {
        atom.index = Some(self.atoms.len() as u32);
        self.molecular_hash = None;
        self.atoms.push(atom);
        sort_atoms(&mut self.atoms);
        self
    }

    /// Append the `I` atom that chains the identity to the remainder position.
    pub fn add_continuity_atom(&mut self) -> Result<&mut Self> {
        let remainder = self.remainder()?.clone();
        let atom = self.stamp(Atom::create(
            Isotope::I,
            &remainder,
            None,
            Some("walletBundle"),
            remainder.bundle.as_deref(),
            Vec::new(),
            None,
        ));
        Ok(self.add_atom(atom))
    }

    /// Transfer `amount` from the source wallet to `recipient`.
    ///
    /// The source balance is spent in full: one atom debits the whole
    /// balance, one credits the recipient and one credits the remainder
    /// wallet with what is left.
    pub fn init_value(&mut self, recipient: &Wallet, amount: Decimal) -> Result<&mut Self> {
        let source = self.source()?.clone();
        if amount <= Decimal::ZERO {
            return Err(TransferError::Malformed(format!("amount must be positive, got {amount}")).into());
        }
        if source.balance < amount {
            return Err(TransferError::BalanceInsufficient {
                balance: source.balance,
                required: amount,
            }
            .into());
        }
        let remainder = self.remainder()?.clone();

        let mut recipient = recipient.clone();
        if recipient.batch_id.is_none() {
            recipient.init_batch_id(&source, false);
        }

        let debit = self.stamp(Atom::create(
            Isotope::V,
            &source,
            Some(-source.balance),
            None,
            None,
            Vec::new(),
            source.batch_id.clone(),
        ));
        let credit = self.stamp(Atom::create(
            Isotope::V,
            &recipient,
            Some(amount),
            Some("walletBundle"),
            recipient.bundle.as_deref(),
            Vec::new(),
            recipient.batch_id.clone(),
        ));
        let rest = self.stamp(Atom::create(
            Isotope::V,
            &remainder,
            Some(source.balance - amount),
            Some("walletBundle"),
            remainder.bundle.as_deref(),
            Vec::new(),
            remainder.batch_id.clone(),
        ));

        self.add_atom(debit).add_atom(credit).add_atom(rest);
        Ok(self)
    }

    /// Attach metadata to `(meta_type, meta_id)` with access policies.
    pub fn init_meta(
        &mut self,
        meta: Vec<MetaItem>,
        meta_type: &str,
        meta_id: &str,
        policy: Option<&PolicyMeta>,
    ) -> Result<&mut Self> {
        let source = self.source()?.clone();
        let meta = AtomMeta::from(meta)
            .add_policy(&policy.cloned().unwrap_or_default())
            .into_items();
        let atom = self.stamp(Atom::create(
            Isotope::M,
            &source,
            None,
            Some(meta_type),
            Some(meta_id),
            meta,
            None,
        ));
        self.add_atom(atom);
        self.continue_identity(&source)
    }

    /// Create a new token, issuing `amount` units into `recipient`.
    pub fn init_token_creation(
        &mut self,
        recipient: &Wallet,
        amount: Decimal,
        meta: Vec<MetaItem>,
    ) -> Result<&mut Self> {
        let source = self.source()?.clone();
        let mut atom_meta = AtomMeta::from(meta).set("token", recipient.token.as_str());
        if let Some(address) = &recipient.address {
            atom_meta = atom_meta.set("walletAddress", address.as_str());
        }
        if let Some(position) = &recipient.position {
            atom_meta = atom_meta.set("walletPosition", position.as_str());
        }
        if let Some(pubkey) = &recipient.pubkey {
            atom_meta = atom_meta.set("walletPubkey", pubkey.as_str());
        }
        if let Some(characters) = &recipient.characters {
            atom_meta = atom_meta.set("walletCharacters", characters.as_str());
        }

        let atom = self.stamp(Atom::create(
            Isotope::T,
            &source,
            Some(amount),
            Some("token"),
            Some(&recipient.token),
            atom_meta.into_items(),
            recipient.batch_id.clone(),
        ));
        self.add_atom(atom);
        self.continue_identity(&source)
    }

    /// Request `amount` units of an existing token for `(meta_type, meta_id)`.
    ///
    /// A `wallet` target must name the receiving `position` and `bundle`.
    pub fn init_token_request(
        &mut self,
        token: &str,
        amount: Decimal,
        meta_type: &str,
        meta_id: &str,
        meta: Vec<MetaItem>,
    ) -> Result<&mut Self> {
        let source = self.source()?.clone();
        let atom_meta = AtomMeta::from(meta).set("token", token);
        if meta_type.eq_ignore_ascii_case("wallet") {
            for key in ["position", "bundle"] {
                if !atom_meta.keys().any(|k| k == key) {
                    return Err(PolicyError::MetaMissing {
                        isotope: Isotope::T,
                        key: key.to_string(),
                    }
                    .into());
                }
            }
        }

        let atom = self.stamp(Atom::create(
            Isotope::T,
            &source,
            Some(amount),
            Some(meta_type),
            Some(meta_id),
            atom_meta.into_items(),
            None,
        ));
        self.add_atom(atom);
        self.continue_identity(&source)
    }

    /// Register `wallet` on the ledger.
    pub fn init_wallet_creation(&mut self, wallet: &Wallet) -> Result<&mut Self> {
        let source = self.source()?.clone();
        let (Some(address), Some(position)) = (&wallet.address, &wallet.position) else {
            return Err(CredentialError::Malformed {
                field: "wallet",
                reason: "a shadow wallet cannot be registered".into(),
            }
            .into());
        };

        let mut atom_meta = AtomMeta::new()
            .set("address", address.as_str())
            .set("token", wallet.token.as_str())
            .set("bundle", wallet.bundle.clone().unwrap_or_default())
            .set("position", position.as_str())
            .set("amount", "0");
        if let Some(batch_id) = &wallet.batch_id {
            atom_meta = atom_meta.set("batchId", batch_id.as_str());
        }
        if let Some(pubkey) = &wallet.pubkey {
            atom_meta = atom_meta.set("pubkey", pubkey.as_str());
        }
        if let Some(characters) = &wallet.characters {
            atom_meta = atom_meta.set("characters", characters.as_str());
        }

        let atom = self.stamp(Atom::create(
            Isotope::C,
            &source,
            None,
            Some("wallet"),
            Some(address),
            atom_meta.into_items(),
            None,
        ));
        self.add_atom(atom);
        self.continue_identity(&source)
    }

    /// Request an authorization, signed by an `AUTH` wallet.
    pub fn init_authorization(&mut self, meta: Vec<MetaItem>) -> Result<&mut Self> {
        let source = self.source()?.clone();
        let atom = self.stamp(Atom::create(
            Isotope::U,
            &source,
            None,
            None,
            None,
            AtomMeta::from(meta).into_items(),
            None,
        ));
        self.add_atom(atom);
        self.continue_identity(&source)
    }

    /// Attach rules to `(meta_type, meta_id)`.
    pub fn init_rule(
        &mut self,
        rules: &[Rule],
        meta_type: &str,
        meta_id: &str,
        policy: Option<&PolicyMeta>,
    ) -> Result<&mut Self> {
        let source = self.source()?.clone();
        if rules.is_empty() {
            return Err(PolicyError::RuleInvalid("no rules".into()).into());
        }
        let mut atom_meta = AtomMeta::new().set("rule", serde_json::to_string(rules)?);
        if let Some(policy) = policy {
            atom_meta = atom_meta.set("policy", policy.to_json()?);
        }

        let atom = self.stamp(Atom::create(
            Isotope::R,
            &source,
            None,
            Some(meta_type),
            Some(meta_id),
            atom_meta.into_items(),
            None,
        ));
        self.add_atom(atom);
        self.continue_identity(&source)
    }

    /// Compute the molecular hash and distribute the one-time signature.
    ///
    /// The key is derived from the secret and the first atom's token and
    /// position. Returns the molecular hash.
    pub fn sign(&mut self, options: SignOptions) -> Result<String> {
        let first = self.atoms.first().ok_or_else(|| {
            StructureError::AtomsMissing("cannot sign a molecule without atoms".into())
        })?;
        let position = first.position.clone().ok_or(StructureError::MissingPosition)?;
        let token = first.token.clone();
        let secret = self
            .secret
            .as_ref()
            .ok_or(CredentialError::MissingSecret("sign a molecule"))?;

        if options.anonymous {
            self.bundle = None;
        } else if self.bundle.is_none() {
            self.bundle = Some(secret.bundle_hash());
        }

        let hash = hash_atoms(&self.atoms)?;
        let normalized = normalized_hash(&hash)?;
        let key = generate_key(secret.as_str(), &token, &position)?;
        let signature = sign(&key, &normalized)?;

        let mut fragments = chunk_signature(&signature, self.atoms.len(), options.compressed)?.into_iter();
        for atom in &mut self.atoms {
            atom.ots_fragment = fragments.next();
        }
        self.molecular_hash = Some(hash.clone());
        Ok(hash)
    }

    /// Run every validation rule against this molecule.
    pub fn check(&self, sender: Option<&Wallet>) -> Result<()> {
        CheckMolecule::new(self)?.verify(sender)
    }

    /// Export as JSON. Secrets and private keys are never included.
    pub fn to_json(&self, include_ots: bool) -> Result<String> {
        if include_ots {
            return Ok(serde_json::to_string(self)?);
        }
        let mut stripped = self.clone();
        stripped.atoms = self.atoms.iter().map(Atom::without_ots).collect();
        Ok(serde_json::to_string(&stripped)?)
    }

    /// Import a molecule exported by [`Molecule::to_json`].
    ///
    /// The result carries no secret; it can be checked but not re-signed.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut molecule: Molecule = serde_json::from_str(json)?;
        sort_atoms(&mut molecule.atoms);
        for wallet in molecule.source_wallet.iter().chain(&molecule.remainder_wallet) {
            wallet.validate()?;
        }
        Ok(molecule)
    }

    fn source(&self) -> Result<&Wallet> {
        self.source_wallet
            .as_ref()
            .ok_or_else(|| StructureError::MissingWallet("source").into())
    }

    fn remainder(&self) -> Result<&Wallet> {
        self.remainder_wallet
            .as_ref()
            .ok_or_else(|| StructureError::MissingWallet("remainder").into())
    }

    fn stamp(&self, atom: Atom) -> Atom {
        atom.with_created_at(self.created_at.clone())
    }

    fn continue_identity(&mut self, source: &Wallet) -> Result<&mut Self> {
        if source.token == IDENTITY_TOKEN {
            self.add_continuity_atom()?;
        }
        Ok(self)
    }
}
