//! Error types for the Molecula core.
//!
//! Each family of failure gets its own enum so callers can match on the
//! kind of problem without string inspection. [`CoreError`] unifies them.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Isotope;

/// Malformed key material or wallet identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("a secret is required to {0}")]
    MissingSecret(&'static str),
}

/// Structural problems with a molecule or its atoms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("molecular hash is missing")]
    MissingHash,

    #[error("atoms missing: {0}")]
    AtomsMissing(String),

    #[error("atom index error on {isotope} atom (index {index:?}): {reason}")]
    AtomIndex {
        isotope: Isotope,
        index: Option<u32>,
        reason: &'static str,
    },

    #[error("signing atom has no position")]
    MissingPosition,

    #[error("molecule has no {0} wallet")]
    MissingWallet(&'static str),
}

/// Molecular hash and one-time signature failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("molecular hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("signature mismatch: signed by {actual}, expected {expected}")]
    Mismatch { expected: String, actual: String },

    #[error("malformed signature: {0}")]
    Malformed(String),
}

/// Token and isotope policy violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("\"{token}\" is not a valid token slug for {isotope} atoms (expected \"{expected}\")")]
    WrongToken {
        isotope: Isotope,
        token: String,
        expected: &'static str,
    },

    #[error("{isotope} atom is missing meta: {key}")]
    MetaMissing { isotope: Isotope, key: String },

    #[error("{isotope} atom has malformed meta: {reason}")]
    MetaMalformed { isotope: Isotope, reason: String },

    #[error("invalid policy value: {0}")]
    PolicyInvalid(String),

    #[error("invalid rule: {0}")]
    RuleInvalid(String),
}

/// Value-transfer accounting failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("unbalanced transfer: V atoms sum to {sum}")]
    Unbalanced { sum: Decimal },

    #[error("insufficient balance: {balance} available, {required} required")]
    BalanceInsufficient { balance: Decimal, required: Decimal },

    #[error("remainder mismatch: expected {expected}, got {actual}")]
    RemainderMismatch { expected: Decimal, actual: Decimal },

    #[error("transfer to self: {address}")]
    ToSelf { address: String },

    #[error("mismatched token: expected {expected}, got {actual}")]
    Mismatched { expected: String, actual: String },

    #[error("malformed transfer: {0}")]
    Malformed(String),
}

/// Batch id consistency failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("V atom at index {index:?} has no batch id")]
    Missing { index: Option<u32> },

    #[error("batch id mismatch: signing atom {first}, remainder atom {last:?}")]
    Mismatch { first: String, last: Option<String> },

    #[error("no atoms to check batch ids against")]
    Empty,
}

/// Any error raised by the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Encoding(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
