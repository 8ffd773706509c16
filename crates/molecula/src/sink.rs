//! LedgerSink: the submission boundary.
//!
//! The facade hands signed molecules to a sink and never talks to the
//! network itself. A sink may be a GraphQL transport, a queue, or the
//! in-memory ledger used by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use molecula_core::Molecule;

/// Errors raised by a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink refused the molecule outright.
    #[error("molecule rejected: {0}")]
    Rejected(String),

    /// Molecule serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The sink could not be reached.
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of submitting a molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// Molecule was accepted under its molecular hash.
    Accepted(String),
    /// The exact same molecule was already submitted (idempotent).
    AlreadyExists,
    /// Another molecule was already signed from this position.
    PositionSpent {
        /// The reused signing position.
        position: String,
        /// Molecular hash of the molecule that spent it.
        existing: String,
    },
}

/// Async interface to wherever signed molecules go.
///
/// # Design Notes
///
/// - **Idempotent submits**: submitting the same molecule twice returns `AlreadyExists`.
/// - **One-time positions**: a second molecule signed from an already used
///   position returns `PositionSpent` with the first molecule's hash.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    /// Submit a signed molecule.
    async fn submit(&self, molecule: &Molecule) -> Result<SubmitResult, SinkError>;

    /// Get a molecule by its molecular hash.
    async fn get_molecule(&self, hash: &str) -> Result<Option<Molecule>, SinkError>;

    /// All molecules signed by a bundle, in submission order.
    async fn list_molecules(&self, bundle: &str) -> Result<Vec<Molecule>, SinkError>;

    /// The hash of the molecule that spent `position`, if any.
    async fn position_spent(&self, position: &str) -> Result<Option<String>, SinkError>;
}

/// In-memory ledger sink.
///
/// Molecules are stored in their exported JSON form, so nothing secret ever
/// crosses the boundary. Thread-safe via an async RwLock.
pub struct MemorySink {
    inner: RwLock<MemorySinkInner>,
}

#[derive(Default)]
struct MemorySinkInner {
    /// Exported molecules indexed by molecular hash.
    molecules: HashMap<String, String>,

    /// Signing position -> molecular hash.
    positions: HashMap<String, String>,

    /// Molecular hashes in submission order.
    order: Vec<String>,
}

impl MemorySink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemorySinkInner::default()),
        }
    }

    /// Number of accepted molecules.
    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerSink for MemorySink {
    async fn submit(&self, molecule: &Molecule) -> Result<SubmitResult, SinkError> {
        let hash = molecule
            .molecular_hash
            .clone()
            .ok_or_else(|| SinkError::Rejected("molecule is not signed".into()))?;
        let position = molecule
            .atoms()
            .first()
            .and_then(|atom| atom.position.clone())
            .ok_or_else(|| SinkError::Rejected("signing atom has no position".into()))?;
        let exported = molecule
            .to_json(true)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;

        let mut inner = self.inner.write().await;

        if inner.molecules.contains_key(&hash) {
            return Ok(SubmitResult::AlreadyExists);
        }

        if let Some(existing) = inner.positions.get(&position) {
            return Ok(SubmitResult::PositionSpent {
                position,
                existing: existing.clone(),
            });
        }

        inner.molecules.insert(hash.clone(), exported);
        inner.positions.insert(position, hash.clone());
        inner.order.push(hash.clone());

        Ok(SubmitResult::Accepted(hash))
    }

    async fn get_molecule(&self, hash: &str) -> Result<Option<Molecule>, SinkError> {
        let inner = self.inner.read().await;
        inner
            .molecules
            .get(hash)
            .map(|json| decode(json))
            .transpose()
    }

    async fn list_molecules(&self, bundle: &str) -> Result<Vec<Molecule>, SinkError> {
        let inner = self.inner.read().await;
        let mut out = Vec::new();
        for hash in &inner.order {
            let Some(json) = inner.molecules.get(hash) else {
                continue;
            };
            let molecule = decode(json)?;
            if molecule.bundle.as_deref() == Some(bundle) {
                out.push(molecule);
            }
        }
        Ok(out)
    }

    async fn position_spent(&self, position: &str) -> Result<Option<String>, SinkError> {
        let inner = self.inner.read().await;
        Ok(inner.positions.get(position).cloned())
    }
}

fn decode(json: &str) -> Result<Molecule, SinkError> {
    Molecule::from_json(json).map_err(|e| SinkError::Serialization(e.to_string()))
}
