//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Everything a fixture derives is
//! deterministic in its seed, including signing positions and timestamps.

use molecula::{Composer, ComposerConfig, MemorySink};
use molecula_core::{meta_from_pairs, shake256, Molecule, Secret, SignOptions, Wallet, IDENTITY_TOKEN};
use rust_decimal::Decimal;

/// Timestamp stamped on every fixture molecule.
pub const FIXTURE_CREATED_AT: &str = "1700000000000";

/// A test fixture with a secret derived from a seed phrase.
pub struct TestFixture {
    pub seed: String,
    pub secret: Secret,
}

impl TestFixture {
    /// Create a new test fixture with a random secret.
    pub fn new() -> Self {
        Self {
            seed: String::new(),
            secret: Secret::random(),
        }
    }

    /// Create with a deterministic secret from a seed phrase.
    pub fn with_seed(seed: &str) -> Self {
        Self {
            seed: seed.to_string(),
            secret: Secret::from_seed(seed),
        }
    }

    pub fn bundle(&self) -> String {
        self.secret.bundle_hash()
    }

    /// A signing position derived from the bundle and a label.
    pub fn position(&self, label: &str) -> String {
        shake256(format!("{}{}", self.bundle(), label), 256)
    }

    /// The wallet for `token` at the position named by `label`.
    pub fn wallet(&self, token: &str, label: &str) -> Wallet {
        Wallet::new(&self.secret, token, Some(&self.position(label)))
            .expect("fixture positions are valid")
    }

    /// A wallet holding `balance` whole units.
    pub fn funded_wallet(&self, token: &str, label: &str, balance: i64) -> Wallet {
        self.wallet(token, label).with_balance(Decimal::new(balance, 0))
    }

    /// An unsigned molecule with a deterministic remainder and timestamp.
    pub fn molecule(&self, source: Wallet, remainder_label: &str) -> Molecule {
        let remainder = self.wallet(&source.token, remainder_label);
        Molecule::new(self.secret.clone(), source)
            .expect("fixture wallets are valid")
            .with_remainder(remainder)
            .with_created_at(FIXTURE_CREATED_AT)
    }

    /// Create a signed transfer of `amount` from `source` to `recipient`.
    pub fn make_transfer(&self, source: Wallet, recipient: &Wallet, amount: Decimal) -> Molecule {
        let mut molecule = self.molecule(source, "remainder");
        molecule
            .init_value(recipient, amount)
            .expect("fixture transfer is funded");
        molecule
            .sign(SignOptions::default())
            .expect("fixture molecule signs");
        molecule
    }

    /// Create a signed metadata write from this fixture's identity wallet.
    pub fn make_meta(&self, meta_type: &str, meta_id: &str, pairs: &[(&str, &str)]) -> Molecule {
        let source = self.wallet(IDENTITY_TOKEN, "identity");
        let mut molecule = self.molecule(source, "identity-next");
        molecule
            .init_meta(meta_from_pairs(pairs.iter().copied()), meta_type, meta_id, None)
            .expect("fixture meta is valid");
        molecule
            .sign(SignOptions::default())
            .expect("fixture molecule signs");
        molecule
    }

    /// A composer for this fixture's secret over an empty in-memory sink.
    pub fn composer(&self) -> Composer<MemorySink> {
        Composer::new(self.secret.clone(), MemorySink::new(), ComposerConfig::default())
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| TestFixture::with_seed(&format!("PARTY{i}")))
        .collect()
}
