//! The Composer: build, sign, verify and submit molecules.
//!
//! The Composer holds the caller's secret and a ledger sink. Every
//! operation builds one molecule against a source wallet, signs it with the
//! key at the source position and hands it to the sink.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;

use molecula_core::{MetaItem, Molecule, PolicyMeta, Rule, Secret, SignOptions, Wallet};

use crate::error::{Result, SdkError};
use crate::sink::{LedgerSink, SubmitResult};

/// Configuration for the Composer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Cell slug stamped on every molecule.
    pub cell_slug: Option<String>,
    /// Protocol version stamped on every molecule.
    pub version: Option<String>,
    /// Spread signatures as base64 rather than hex.
    pub compress_signatures: bool,
    /// Run the full validator on locally built molecules before submitting.
    pub verify_before_submit: bool,
    /// Whether to validate molecules on ingest.
    pub validate_on_ingest: bool,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            cell_slug: None,
            version: None,
            compress_signatures: true,
            verify_before_submit: true,
            validate_on_ingest: true,
        }
    }
}

/// The main Composer struct.
///
/// Provides one method per ledger operation:
/// - Value transfers
/// - Metadata writes
/// - Token creation and token requests
/// - Wallet registration
/// - Rules and authorization requests
pub struct Composer<S: LedgerSink> {
    /// The signing secret.
    secret: Secret,
    /// Where signed molecules go.
    sink: Arc<S>,
    /// Configuration.
    config: ComposerConfig,
}

impl<S: LedgerSink> Composer<S> {
    /// Create a new composer.
    pub fn new(secret: Secret, sink: S, config: ComposerConfig) -> Self {
        Self {
            secret,
            sink: Arc::new(sink),
            config,
        }
    }

    /// The bundle hash of the signing secret.
    pub fn bundle(&self) -> String {
        self.secret.bundle_hash()
    }

    /// Get the sink reference.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Start an unsigned molecule spending from `source`.
    pub fn molecule(&self, source: Wallet) -> Result<Molecule> {
        let mut molecule = Molecule::new(self.secret.clone(), source)?;
        if let Some(cell_slug) = &self.config.cell_slug {
            molecule = molecule.with_cell_slug(cell_slug.as_str());
        }
        if let Some(version) = &self.config.version {
            molecule = molecule.with_version(version.as_str());
        }
        Ok(molecule)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Transfer `amount` of the source token to `recipient`.
    ///
    /// The whole source balance is spent; the remainder lands in the
    /// molecule's remainder wallet.
    pub async fn transfer(&self, source: Wallet, recipient: &Wallet, amount: Decimal) -> Result<Molecule> {
        if recipient.token != source.token {
            return Err(SdkError::InvalidOperation(format!(
                "cannot transfer {} into a {} wallet",
                source.token, recipient.token
            )));
        }
        let mut molecule = self.molecule(source)?;
        molecule.init_value(recipient, amount)?;
        self.finish(molecule).await
    }

    /// Write metadata on `(meta_type, meta_id)`.
    pub async fn write_meta(
        &self,
        source: Wallet,
        meta_type: &str,
        meta_id: &str,
        meta: Vec<MetaItem>,
        policy: Option<&PolicyMeta>,
    ) -> Result<Molecule> {
        let mut molecule = self.molecule(source)?;
        molecule.init_meta(meta, meta_type, meta_id, policy)?;
        self.finish(molecule).await
    }

    /// Create a new token and issue `amount` units into `recipient`.
    pub async fn create_token(
        &self,
        source: Wallet,
        recipient: &Wallet,
        amount: Decimal,
        meta: Vec<MetaItem>,
    ) -> Result<Molecule> {
        let mut molecule = self.molecule(source)?;
        molecule.init_token_creation(recipient, amount, meta)?;
        self.finish(molecule).await
    }

    /// Request `amount` units of `token` for `(meta_type, meta_id)`.
    pub async fn request_tokens(
        &self,
        source: Wallet,
        token: &str,
        amount: Decimal,
        meta_type: &str,
        meta_id: &str,
        meta: Vec<MetaItem>,
    ) -> Result<Molecule> {
        let mut molecule = self.molecule(source)?;
        molecule.init_token_request(token, amount, meta_type, meta_id, meta)?;
        self.finish(molecule).await
    }

    /// Register `wallet` on the ledger.
    pub async fn create_wallet(&self, source: Wallet, wallet: &Wallet) -> Result<Molecule> {
        let mut molecule = self.molecule(source)?;
        molecule.init_wallet_creation(wallet)?;
        self.finish(molecule).await
    }

    /// Attach rules to `(meta_type, meta_id)`.
    pub async fn create_rule(
        &self,
        source: Wallet,
        rules: &[Rule],
        meta_type: &str,
        meta_id: &str,
        policy: Option<&PolicyMeta>,
    ) -> Result<Molecule> {
        let mut molecule = self.molecule(source)?;
        molecule.init_rule(rules, meta_type, meta_id, policy)?;
        self.finish(molecule).await
    }

    /// Request an authorization. `source` must be an `AUTH` wallet.
    pub async fn request_authorization(&self, source: Wallet, meta: Vec<MetaItem>) -> Result<Molecule> {
        let mut molecule = self.molecule(source)?;
        molecule.init_authorization(meta)?;
        self.finish(molecule).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a submitted molecule by its molecular hash.
    pub async fn get_molecule(&self, hash: &str) -> Result<Molecule> {
        self.sink
            .get_molecule(hash)
            .await?
            .ok_or_else(|| SdkError::NotFound(hash.to_string()))
    }

    /// Molecules signed by this composer's bundle.
    pub async fn list_molecules(&self) -> Result<Vec<Molecule>> {
        Ok(self.sink.list_molecules(&self.bundle()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingest Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Ingest a molecule from an external source.
    ///
    /// Validates against `sender` if configured, then submits. Position reuse
    /// is reported in the result rather than as an error.
    pub async fn ingest(&self, molecule: &Molecule, sender: Option<&Wallet>) -> Result<SubmitResult> {
        if self.config.validate_on_ingest {
            if let Err(e) = molecule.check(sender) {
                tracing::warn!("rejected molecule {:?}: {}", molecule.molecular_hash, e);
                return Err(e.into());
            }
        }

        let result = self.sink.submit(molecule).await?;
        if let SubmitResult::PositionSpent { position, existing } = &result {
            tracing::warn!("position {} already signed molecule {}", position, existing);
        }
        Ok(result)
    }

    /// Sign, optionally verify, and submit a locally built molecule.
    async fn finish(&self, mut molecule: Molecule) -> Result<Molecule> {
        if let Some(position) = molecule.atoms().first().and_then(|a| a.position.clone()) {
            if let Some(existing) = self.sink.position_spent(&position).await? {
                return Err(SdkError::Conflict { position, existing });
            }
        }

        let hash = molecule.sign(SignOptions {
            anonymous: false,
            compressed: self.config.compress_signatures,
        })?;
        tracing::debug!("signed molecule {} with {} atoms", hash, molecule.atoms().len());

        if self.config.verify_before_submit {
            let sender = molecule.source_wallet.clone();
            if let Err(e) = molecule.check(sender.as_ref()) {
                tracing::warn!("molecule {} failed verification: {}", hash, e);
                return Err(e.into());
            }
        }

        match self.sink.submit(&molecule).await? {
            SubmitResult::Accepted(hash) => {
                tracing::info!("molecule {} accepted", hash);
                Ok(molecule)
            }
            SubmitResult::AlreadyExists => Ok(molecule),
            SubmitResult::PositionSpent { position, existing } => {
                Err(SdkError::Conflict { position, existing })
            }
        }
    }
}
