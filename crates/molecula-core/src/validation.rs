//! Molecule validation: integrity, signature and per-isotope ledger rules.
//!
//! [`CheckMolecule`] first checks the molecule is structurally complete,
//! then [`CheckMolecule::verify`] runs every rule in a fixed order and stops
//! at the first violation.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::atom::Atom;
use crate::canonical::hash_atoms;
use crate::error::{
    BatchError, PolicyError, Result, SignatureError, StructureError, TransferError,
};
use crate::molecule::Molecule;
use crate::ots::{assemble_signature, normalized_hash, signature_address};
use crate::policy::{is_valid_principal, POLICY_META_KEYS};
use crate::rule::parse_rules;
use crate::types::{Isotope, AUTH_TOKEN, IDENTITY_TOKEN};
use crate::wallet::Wallet;

/// Validator over a single molecule.
#[derive(Debug, Clone, Copy)]
pub struct CheckMolecule<'a> {
    molecule: &'a Molecule,
    hash: &'a str,
    first: &'a Atom,
}

impl<'a> CheckMolecule<'a> {
    /// Check the preconditions every rule relies on.
    ///
    /// The molecule must be signed, hold at least one atom, and every atom
    /// must carry an index.
    pub fn new(molecule: &'a Molecule) -> Result<Self> {
        let hash = molecule
            .molecular_hash
            .as_deref()
            .ok_or(StructureError::MissingHash)?;
        let first = molecule
            .atoms()
            .first()
            .ok_or_else(|| StructureError::AtomsMissing("molecule has no atoms".into()))?;
        if let Some(atom) = molecule.atoms().iter().find(|a| a.index.is_none()) {
            return Err(StructureError::AtomIndex {
                isotope: atom.isotope,
                index: None,
                reason: "atom has no index",
            }
            .into());
        }
        Ok(Self {
            molecule,
            hash,
            first,
        })
    }

    /// Run every rule. `sender` enables the balance and remainder checks.
    pub fn verify(&self, sender: Option<&Wallet>) -> Result<()> {
        self.molecular_hash()?;
        self.ots()?;
        self.batch_id()?;
        self.continu_id()?;
        self.isotope_m()?;
        self.isotope_t()?;
        self.isotope_c()?;
        self.isotope_u()?;
        self.isotope_i()?;
        self.isotope_r()?;
        self.isotope_v(sender)
    }

    /// The stored hash matches a fresh hash of the atoms.
    pub fn molecular_hash(&self) -> Result<()> {
        let actual = hash_atoms(self.molecule.atoms())?;
        if actual != self.hash {
            return Err(SignatureError::HashMismatch {
                expected: self.hash.to_string(),
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// The reassembled signature was produced by the signing wallet.
    ///
    /// The signing wallet is the first atom's wallet unless that atom carries
    /// a `signingWallet` meta entry naming another address.
    pub fn ots(&self) -> Result<()> {
        let normalized = normalized_hash(self.hash)?;
        let signature = assemble_signature(
            self.molecule
                .atoms()
                .iter()
                .filter_map(|a| a.ots_fragment.as_deref()),
        )?;
        let address = signature_address(&signature, &normalized)?;

        let expected = match self.first.meta_value("signingWallet") {
            Some(json) => signing_wallet_address(json)?,
            None => self.first.wallet_address.clone().unwrap_or_default(),
        };
        if address != expected {
            return Err(SignatureError::Mismatch {
                expected,
                actual: address,
            }
            .into());
        }
        Ok(())
    }

    /// A batched transfer keeps one batch id from signing atom to remainder.
    pub fn batch_id(&self) -> Result<()> {
        if self.first.isotope != Isotope::V {
            return Ok(());
        }
        let Some(first_batch) = &self.first.batch_id else {
            return Ok(());
        };
        let value_atoms: Vec<&Atom> = self.molecule.isotopes(Isotope::V).collect();
        let remainder = value_atoms.last().ok_or(BatchError::Empty)?;
        if remainder.batch_id.as_ref() != Some(first_batch) {
            return Err(BatchError::Mismatch {
                first: first_batch.clone(),
                last: remainder.batch_id.clone(),
            }
            .into());
        }
        if let Some(atom) = value_atoms.iter().find(|a| a.batch_id.is_none()) {
            return Err(BatchError::Missing { index: atom.index }.into());
        }
        Ok(())
    }

    /// Identity-token molecules must chain to the next position.
    pub fn continu_id(&self) -> Result<()> {
        if self.first.token == IDENTITY_TOKEN && self.molecule.isotopes(Isotope::I).next().is_none() {
            return Err(StructureError::AtomsMissing(
                "identity molecule has no continuity atom".into(),
            )
            .into());
        }
        Ok(())
    }

    /// Metadata atoms carry meta, use the identity token and valid policies.
    pub fn isotope_m(&self) -> Result<()> {
        for atom in self.molecule.isotopes(Isotope::M) {
            if atom.meta.is_empty() {
                return Err(PolicyError::MetaMissing {
                    isotope: Isotope::M,
                    key: "meta".into(),
                }
                .into());
            }
            require_token(atom, IDENTITY_TOKEN)?;

            let metas = atom.aggregated_meta();
            for policy_key in POLICY_META_KEYS {
                let Some(policy) = metas.get(policy_key) else {
                    continue;
                };
                let policy: Value = serde_json::from_str(policy).map_err(|e| {
                    PolicyError::MetaMalformed {
                        isotope: Isotope::M,
                        reason: format!("{policy_key}: {e}"),
                    }
                })?;
                let Some(entries) = policy.as_object() else {
                    return Err(PolicyError::PolicyInvalid(format!("{policy_key} must be an object")).into());
                };
                for (name, principals) in entries {
                    if POLICY_META_KEYS.contains(&name.as_str()) {
                        continue;
                    }
                    if !metas.contains_key(name) {
                        return Err(PolicyError::MetaMissing {
                            isotope: Isotope::M,
                            key: name.clone(),
                        }
                        .into());
                    }
                    let Some(principals) = principals.as_array() else {
                        return Err(PolicyError::PolicyInvalid(format!(
                            "principals for {name} must be a list"
                        ))
                        .into());
                    };
                    for principal in principals {
                        match principal.as_str() {
                            Some(p) if is_valid_principal(p) => {}
                            _ => {
                                return Err(PolicyError::PolicyInvalid(format!(
                                    "{principal} is not a valid principal for {name}"
                                ))
                                .into())
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Token-creation and token-request atoms.
    pub fn isotope_t(&self) -> Result<()> {
        for atom in self.molecule.isotopes(Isotope::T) {
            let metas = atom.aggregated_meta();
            let is_wallet = atom
                .meta_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("wallet"));
            if is_wallet {
                for key in ["position", "bundle"] {
                    if !metas.contains_key(key) {
                        return Err(PolicyError::MetaMissing {
                            isotope: Isotope::T,
                            key: key.into(),
                        }
                        .into());
                    }
                }
            }
            if !metas.contains_key("token") {
                return Err(PolicyError::MetaMissing {
                    isotope: Isotope::T,
                    key: "token".into(),
                }
                .into());
            }
            require_token(atom, IDENTITY_TOKEN)?;
            require_signing_index(atom)?;
        }
        Ok(())
    }

    /// Wallet-creation atoms.
    pub fn isotope_c(&self) -> Result<()> {
        for atom in self.molecule.isotopes(Isotope::C) {
            require_token(atom, IDENTITY_TOKEN)?;
            require_signing_index(atom)?;
        }
        Ok(())
    }

    /// Authorization atoms.
    pub fn isotope_u(&self) -> Result<()> {
        for atom in self.molecule.isotopes(Isotope::U) {
            require_token(atom, AUTH_TOKEN)?;
            require_signing_index(atom)?;
        }
        Ok(())
    }

    /// Continuity atoms never sign.
    pub fn isotope_i(&self) -> Result<()> {
        for atom in self.molecule.isotopes(Isotope::I) {
            require_token(atom, IDENTITY_TOKEN)?;
            if atom.index == Some(0) {
                return Err(StructureError::AtomIndex {
                    isotope: Isotope::I,
                    index: atom.index,
                    reason: "continuity atom cannot be at index 0",
                }
                .into());
            }
        }
        Ok(())
    }

    /// Rule atoms carry a well-formed policy and rule list.
    pub fn isotope_r(&self) -> Result<()> {
        for atom in self.molecule.isotopes(Isotope::R) {
            let metas = atom.aggregated_meta();
            if let Some(policy) = metas.get("policy") {
                let policy: Value = serde_json::from_str(policy).map_err(|e| {
                    PolicyError::MetaMalformed {
                        isotope: Isotope::R,
                        reason: format!("policy: {e}"),
                    }
                })?;
                let Some(sections) = policy.as_object() else {
                    return Err(PolicyError::MetaMalformed {
                        isotope: Isotope::R,
                        reason: "policy must be an object".into(),
                    }
                    .into());
                };
                if let Some(key) = sections.keys().find(|k| !matches!(k.as_str(), "read" | "write")) {
                    return Err(PolicyError::MetaMalformed {
                        isotope: Isotope::R,
                        reason: format!("policy key {key:?} is not read or write"),
                    }
                    .into());
                }
            }
            if let Some(rule) = metas.get("rule") {
                parse_rules(rule)?;
            }
        }
        Ok(())
    }

    /// Value conservation and, given the sender, balance accounting.
    pub fn isotope_v(&self, sender: Option<&Wallet>) -> Result<()> {
        let value_atoms: Vec<&Atom> = self.molecule.isotopes(Isotope::V).collect();
        if value_atoms.is_empty() {
            return Ok(());
        }

        // Minimal two-party transfer: token match and a non-negative end.
        if self.first.isotope == Isotope::V && value_atoms.len() == 2 {
            let end = value_atoms[1];
            require_same_token(self.first, end)?;
            if atom_value(end)? < Decimal::ZERO {
                return Err(TransferError::Malformed(format!(
                    "ending atom has negative value {}",
                    atom_value(end)?
                ))
                .into());
            }
            return Ok(());
        }

        let mut sum = Decimal::ZERO;
        for (position, atom) in self.molecule.atoms().iter().enumerate() {
            if atom.isotope != Isotope::V {
                continue;
            }
            let value = atom_value(atom)?;
            require_same_token(self.first, atom)?;
            if position > 0 {
                if value < Decimal::ZERO {
                    return Err(TransferError::Malformed(format!(
                        "atom {:?} debits {value}; only the signing atom may debit",
                        atom.index
                    ))
                    .into());
                }
                if atom.wallet_address == self.first.wallet_address {
                    return Err(TransferError::ToSelf {
                        address: atom.wallet_address.clone().unwrap_or_default(),
                    }
                    .into());
                }
            }
            sum += value;
        }

        if !sum.is_zero() {
            return Err(TransferError::Unbalanced { sum }.into());
        }

        if let Some(sender) = sender {
            let debit = atom_value(self.first)?;
            let remainder = sender.balance + debit;
            if remainder < Decimal::ZERO {
                return Err(TransferError::BalanceInsufficient {
                    balance: sender.balance,
                    required: -debit,
                }
                .into());
            }
            if remainder != sum {
                return Err(TransferError::RemainderMismatch {
                    expected: sum,
                    actual: remainder,
                }
                .into());
            }
        } else if let Some(last) = value_atoms.last() {
            // Without a sender nothing can reconcile a leftover remainder.
            let leftover = atom_value(last)?;
            if !leftover.is_zero() {
                return Err(TransferError::RemainderMismatch {
                    expected: Decimal::ZERO,
                    actual: leftover,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Validate a molecule, optionally against the wallet it spends from.
pub fn validate_molecule(molecule: &Molecule, sender: Option<&Wallet>) -> Result<()> {
    CheckMolecule::new(molecule)?.verify(sender)
}

fn signing_wallet_address(json: &str) -> Result<String> {
    let wallet: Value = serde_json::from_str(json)
        .map_err(|e| SignatureError::Malformed(format!("signingWallet: {e}")))?;
    wallet
        .get("address")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| SignatureError::Malformed("signingWallet has no address".into()).into())
}

fn require_token(atom: &Atom, expected: &'static str) -> Result<()> {
    if atom.token != expected {
        return Err(PolicyError::WrongToken {
            isotope: atom.isotope,
            token: atom.token.clone(),
            expected,
        }
        .into());
    }
    Ok(())
}

fn require_signing_index(atom: &Atom) -> Result<()> {
    if atom.index != Some(0) {
        return Err(StructureError::AtomIndex {
            isotope: atom.isotope,
            index: atom.index,
            reason: "atom must be at index 0",
        }
        .into());
    }
    Ok(())
}

fn require_same_token(first: &Atom, atom: &Atom) -> Result<()> {
    if atom.token != first.token {
        return Err(TransferError::Mismatched {
            expected: first.token.clone(),
            actual: atom.token.clone(),
        }
        .into());
    }
    Ok(())
}

fn atom_value(atom: &Atom) -> Result<Decimal> {
    atom.value.ok_or_else(|| {
        TransferError::Malformed(format!("V atom {:?} has no value", atom.index)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::meta::{meta_from_pairs, AtomMeta, MetaItem};
    use crate::molecule::SignOptions;
    use crate::policy::PolicyMeta;
    use crate::rule::{Callback, Comparison, Condition, Rule};
    use crate::wallet::Secret;

    fn position(c: char) -> String {
        c.to_string().repeat(64)
    }

    fn wallet(secret: &Secret, token: &str, c: char) -> Wallet {
        Wallet::new(secret, token, Some(&position(c))).unwrap()
    }

    fn signed(mut molecule: Molecule) -> Molecule {
        molecule.sign(SignOptions::default()).unwrap();
        molecule
    }

    /// Molecule from `source`, with the given atoms appended as-is.
    fn custom(secret: Secret, source: Wallet, atoms: Vec<Atom>) -> Molecule {
        let mut molecule = Molecule::new(secret, source).unwrap();
        for atom in atoms {
            molecule.add_atom(atom);
        }
        molecule
    }

    fn value_atom(wallet: &Wallet, value: i64) -> Atom {
        Atom::create(
            Isotope::V,
            wallet,
            Some(Decimal::new(value, 0)),
            None,
            None,
            vec![],
            None,
        )
    }

    fn transfer(balance: i64, amount: i64) -> (Molecule, Wallet) {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1').with_balance(Decimal::new(balance, 0));
        let remainder = wallet(&secret, "TEST", '3');
        let recipient = wallet(&Secret::from_seed("OTHER"), "TEST", '2');
        let mut molecule = Molecule::new(secret, source.clone())
            .unwrap()
            .with_remainder(remainder);
        molecule
            .init_value(&recipient, Decimal::new(amount, 0))
            .unwrap();
        (signed(molecule), source)
    }

    fn tamper_char(s: &str, at: usize) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[at] = if chars[at] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_preconditions() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1');
        let unsigned = Molecule::new(secret, source).unwrap();
        assert!(matches!(
            CheckMolecule::new(&unsigned).unwrap_err(),
            CoreError::Structure(StructureError::MissingHash)
        ));

        let (molecule, _) = transfer(100, 40);
        let mut value: Value = serde_json::from_str(&molecule.to_json(true).unwrap()).unwrap();
        value["atoms"][1]["index"] = Value::Null;
        let unindexed = Molecule::from_json(&value.to_string()).unwrap();
        assert!(matches!(
            CheckMolecule::new(&unindexed).unwrap_err(),
            CoreError::Structure(StructureError::AtomIndex { .. })
        ));

        value["atoms"] = Value::Array(vec![]);
        let empty = Molecule::from_json(&value.to_string()).unwrap();
        assert!(matches!(
            CheckMolecule::new(&empty).unwrap_err(),
            CoreError::Structure(StructureError::AtomsMissing(_))
        ));
    }

    #[test]
    fn test_partial_transfer_passes() {
        let (molecule, sender) = transfer(1000, 400);
        molecule.check(Some(&sender)).unwrap();
        validate_molecule(&molecule, Some(&sender)).unwrap();
    }

    #[test]
    fn test_partial_transfer_without_sender_fails() {
        let (molecule, _) = transfer(1000, 400);
        match validate_molecule(&molecule, None).unwrap_err() {
            CoreError::Transfer(TransferError::RemainderMismatch { expected, actual }) => {
                assert_eq!(expected, Decimal::ZERO);
                assert_eq!(actual, Decimal::new(600, 0));
            }
            other => panic!("expected RemainderMismatch, got {:?}", other),
        }

        let (full, _) = transfer(1000, 1000);
        validate_molecule(&full, None).unwrap();
    }

    #[test]
    fn test_overwritten_hash_fails() {
        let (mut molecule, sender) = transfer(1000, 1000);
        molecule.molecular_hash = Some("arbitrary".into());
        assert!(matches!(
            molecule.check(Some(&sender)).unwrap_err(),
            CoreError::Signature(_)
        ));
    }

    #[test]
    fn test_tampered_hash_character_fails() {
        let (mut molecule, _) = transfer(1000, 1000);
        let hash = molecule.molecular_hash.clone().unwrap();
        molecule.molecular_hash = Some(tamper_char(&hash, 10));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Signature(SignatureError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_fragment_fails() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1').with_balance(Decimal::new(50, 0));
        let recipient = wallet(&Secret::from_seed("OTHER"), "TEST", '2');
        let mut molecule = Molecule::new(secret, source).unwrap();
        molecule.init_value(&recipient, Decimal::new(20, 0)).unwrap();
        molecule
            .sign(SignOptions {
                anonymous: false,
                compressed: false,
            })
            .unwrap();

        let mut value: Value = serde_json::from_str(&molecule.to_json(true).unwrap()).unwrap();
        let fragment = value["atoms"][1]["otsFragment"].as_str().unwrap().to_string();
        value["atoms"][1]["otsFragment"] = Value::String(tamper_char(&fragment, 5));
        let tampered = Molecule::from_json(&value.to_string()).unwrap();
        assert!(matches!(
            tampered.check(None).unwrap_err(),
            CoreError::Signature(SignatureError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_unbalanced_transfer_fails() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1').with_balance(Decimal::new(1000, 0));
        let recipient = wallet(&Secret::from_seed("OTHER"), "TEST", '2');
        let remainder = wallet(&secret, "TEST", '3');
        let molecule = signed(custom(
            secret,
            source.clone(),
            vec![
                value_atom(&source, -1000),
                value_atom(&recipient, 500),
                value_atom(&remainder, 0),
            ],
        ));
        assert!(matches!(
            molecule.check(Some(&source)).unwrap_err(),
            CoreError::Transfer(TransferError::Unbalanced { .. })
        ));
    }

    #[test]
    fn test_two_atom_special_case() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1');
        let recipient = wallet(&Secret::from_seed("OTHER"), "TEST", '2');
        let ok = signed(custom(
            secret.clone(),
            source.clone(),
            vec![value_atom(&source, -10), value_atom(&recipient, 10)],
        ));
        ok.check(None).unwrap();

        let negative_end = signed(custom(
            secret.clone(),
            source.clone(),
            vec![value_atom(&source, 10), value_atom(&recipient, -10)],
        ));
        assert!(matches!(
            negative_end.check(None).unwrap_err(),
            CoreError::Transfer(TransferError::Malformed(_))
        ));

        let other_token = wallet(&Secret::from_seed("OTHER"), "OTHER", '2');
        let mismatched = signed(custom(
            secret,
            source.clone(),
            vec![value_atom(&source, -10), value_atom(&other_token, 10)],
        ));
        assert!(matches!(
            mismatched.check(None).unwrap_err(),
            CoreError::Transfer(TransferError::Mismatched { .. })
        ));
    }

    #[test]
    fn test_transfer_to_self_fails() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1');
        let remainder = wallet(&secret, "TEST", '3');
        let molecule = signed(custom(
            secret,
            source.clone(),
            vec![
                value_atom(&source, -10),
                value_atom(&source, 10),
                value_atom(&remainder, 0),
            ],
        ));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Transfer(TransferError::ToSelf { .. })
        ));
    }

    #[test]
    fn test_sender_balance_checks() {
        let (molecule, sender) = transfer(1000, 400);

        let poorer = sender.clone().with_balance(Decimal::new(900, 0));
        assert!(matches!(
            molecule.check(Some(&poorer)).unwrap_err(),
            CoreError::Transfer(TransferError::BalanceInsufficient { .. })
        ));

        let richer = sender.with_balance(Decimal::new(1200, 0));
        assert!(matches!(
            molecule.check(Some(&richer)).unwrap_err(),
            CoreError::Transfer(TransferError::RemainderMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_id_must_carry_through() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1')
            .with_balance(Decimal::new(10, 0))
            .with_batch_id("batch-a");
        let recipient = wallet(&Secret::from_seed("OTHER"), "TEST", '2');
        let remainder = wallet(&secret, "TEST", '3').with_batch_id("batch-a");

        let mut good = Molecule::new(secret.clone(), source.clone())
            .unwrap()
            .with_remainder(remainder.clone());
        good.init_value(&recipient, Decimal::new(4, 0)).unwrap();
        signed(good).check(Some(&source)).unwrap();

        let mut bad = Molecule::new(secret, source.clone())
            .unwrap()
            .with_remainder(remainder.with_batch_id("batch-b"));
        bad.init_value(&recipient, Decimal::new(4, 0)).unwrap();
        assert!(matches!(
            signed(bad).check(Some(&source)).unwrap_err(),
            CoreError::Batch(BatchError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_batch_id_missing_on_recipient() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1').with_balance(Decimal::new(10, 0));
        let recipient = wallet(&Secret::from_seed("OTHER"), "TEST", '2');
        let remainder = wallet(&secret, "TEST", '3');
        let batched = |w: &Wallet, value: i64, batch: Option<&str>| {
            Atom::create(
                Isotope::V,
                w,
                Some(Decimal::new(value, 0)),
                None,
                None,
                vec![],
                batch.map(String::from),
            )
        };
        let molecule = signed(custom(
            secret,
            source.clone(),
            vec![
                batched(&source, -10, Some("batch-a")),
                batched(&recipient, 4, None),
                batched(&remainder, 6, Some("batch-a")),
            ],
        ));
        assert!(matches!(
            molecule.check(Some(&source)).unwrap_err(),
            CoreError::Batch(BatchError::Missing { index: Some(1) })
        ));
    }

    #[test]
    fn test_identity_needs_continuity() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, IDENTITY_TOKEN, '4');
        let atom = Atom::create(
            Isotope::M,
            &source,
            None,
            Some("profile"),
            Some("p1"),
            meta_from_pairs([("name", "alice")]),
            None,
        );
        let molecule = signed(custom(secret, source, vec![atom]));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Structure(StructureError::AtomsMissing(_))
        ));
    }

    fn identity_molecule(atoms: impl FnOnce(&Wallet) -> Vec<Atom>) -> Molecule {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, IDENTITY_TOKEN, '4');
        let atoms = atoms(&source);
        let mut molecule = custom(secret, source, atoms);
        molecule.add_continuity_atom().unwrap();
        signed(molecule)
    }

    fn meta_atom(source: &Wallet, meta: Vec<MetaItem>) -> Atom {
        Atom::create(Isotope::M, source, None, Some("profile"), Some("p1"), meta, None)
    }

    #[test]
    fn test_isotope_m_rules() {
        let empty = identity_molecule(|w| vec![meta_atom(w, vec![])]);
        assert!(matches!(
            empty.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::MetaMissing { .. })
        ));

        let unknown_key = identity_molecule(|w| {
            vec![meta_atom(
                w,
                meta_from_pairs([("name", "a"), ("writePolicy", r#"{"email":["self"]}"#)]),
            )]
        });
        assert!(matches!(
            unknown_key.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::MetaMissing { key, .. }) if key == "email"
        ));

        let bad_principal = identity_molecule(|w| {
            vec![meta_atom(
                w,
                meta_from_pairs([("name", "a"), ("readPolicy", r#"{"name":["friends"]}"#)]),
            )]
        });
        assert!(matches!(
            bad_principal.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::PolicyInvalid(_))
        ));

        let bundle = "c".repeat(64);
        let policy = PolicyMeta::from_value(&serde_json::json!({"read": {"name": [bundle]}})).unwrap();
        let with_bundle = identity_molecule(|w| {
            let meta = AtomMeta::new().set("name", "a").add_policy(&policy).into_items();
            vec![meta_atom(w, meta)]
        });
        with_bundle.check(None).unwrap();
    }

    #[test]
    fn test_isotope_m_wrong_token() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1');
        let atom = meta_atom(&source, meta_from_pairs([("name", "a")]));
        let molecule = signed(custom(secret, source, vec![atom]));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::WrongToken { isotope: Isotope::M, .. })
        ));
    }

    #[test]
    fn test_isotope_t_needs_token_meta() {
        let molecule = identity_molecule(|w| {
            vec![Atom::create(
                Isotope::T,
                w,
                Some(Decimal::ONE),
                Some("token"),
                Some("NEW"),
                vec![],
                None,
            )]
        });
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::MetaMissing { isotope: Isotope::T, .. })
        ));
    }

    #[test]
    fn test_index_rules() {
        // A wallet-creation atom appended after a metadata atom does not sign.
        let molecule = identity_molecule(|w| {
            vec![
                meta_atom(w, meta_from_pairs([("name", "a")])),
                Atom::create(Isotope::C, w, None, Some("wallet"), Some("x"), vec![], None),
            ]
        });
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Structure(StructureError::AtomIndex { isotope: Isotope::C, .. })
        ));
    }

    #[test]
    fn test_isotope_u_requires_auth_token() {
        let molecule = identity_molecule(|w| {
            vec![Atom::create(Isotope::U, w, None, None, None, vec![], None)]
        });
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::WrongToken { isotope: Isotope::U, .. })
        ));
    }

    #[test]
    fn test_isotope_t_and_c_require_identity_token() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, "TEST", '1');

        let token = Atom::create(
            Isotope::T,
            &source,
            Some(Decimal::ONE),
            Some("token"),
            Some("NEW"),
            meta_from_pairs([("token", "NEW")]),
            None,
        );
        let molecule = signed(custom(secret.clone(), source.clone(), vec![token]));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::WrongToken { isotope: Isotope::T, .. })
        ));

        let creation = Atom::create(Isotope::C, &source, None, Some("wallet"), Some("x"), vec![], None);
        let molecule = signed(custom(secret, source, vec![creation]));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::WrongToken { isotope: Isotope::C, .. })
        ));
    }

    #[test]
    fn test_continuity_atom_cannot_sign() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, IDENTITY_TOKEN, '4');
        let continuity = Atom::create(Isotope::I, &source, None, None, None, vec![], None);
        let molecule = signed(custom(secret, source, vec![continuity]));
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Structure(StructureError::AtomIndex { isotope: Isotope::I, index: Some(0), .. })
        ));
    }

    #[test]
    fn test_continuity_atom_requires_identity_token() {
        let foreign = wallet(&Secret::from_seed("OTHER"), "TEST", '5');
        let molecule = identity_molecule(|w| {
            vec![
                meta_atom(w, meta_from_pairs([("name", "a")])),
                Atom::create(Isotope::I, &foreign, None, None, None, vec![], None),
            ]
        });
        assert!(matches!(
            molecule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::WrongToken { isotope: Isotope::I, .. })
        ));
    }

    #[test]
    fn test_isotope_r_rules() {
        let rule = Rule::new(
            vec![Condition {
                key: "status".into(),
                value: serde_json::json!("active"),
                comparison: Comparison::StrictEqual,
            }],
            vec![Callback::new("reject")],
        )
        .unwrap();

        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, IDENTITY_TOKEN, '4');
        let mut good = Molecule::new(secret, source).unwrap();
        good.init_rule(&[rule], "profile", "p1", Some(&PolicyMeta::default()))
            .unwrap();
        signed(good).check(None).unwrap();

        let bad_policy = identity_molecule(|w| {
            vec![Atom::create(
                Isotope::R,
                w,
                None,
                Some("profile"),
                Some("p1"),
                meta_from_pairs([("policy", r#"{"admin":{}}"#)]),
                None,
            )]
        });
        assert!(matches!(
            bad_policy.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::MetaMalformed { .. })
        ));

        let bad_rule = identity_molecule(|w| {
            vec![Atom::create(
                Isotope::R,
                w,
                None,
                Some("profile"),
                Some("p1"),
                meta_from_pairs([("rule", "{}")]),
                None,
            )]
        });
        assert!(matches!(
            bad_rule.check(None).unwrap_err(),
            CoreError::Policy(PolicyError::RuleInvalid(_))
        ));
    }

    #[test]
    fn test_signing_wallet_override() {
        let secret = Secret::from_seed("TESTSEED");
        let source = wallet(&secret, IDENTITY_TOKEN, '4');
        let decoy = wallet(&Secret::from_seed("OTHER"), IDENTITY_TOKEN, '5');

        // Names the real signer: passes even though it sits in the meta.
        let meta = AtomMeta::new()
            .set("name", "a")
            .add_signing_wallet(&source)
            .unwrap()
            .into_items();
        let honest = identity_molecule(|w| vec![meta_atom(w, meta)]);
        honest.check(None).unwrap();

        // Names someone else: the recovered address no longer matches.
        let meta = AtomMeta::new()
            .set("name", "a")
            .add_signing_wallet(&decoy)
            .unwrap()
            .into_items();
        let dishonest = identity_molecule(|w| vec![meta_atom(w, meta)]);
        assert!(matches!(
            dishonest.check(None).unwrap_err(),
            CoreError::Signature(SignatureError::Mismatch { .. })
        ));
    }
}
