//! # Molecula Core
//!
//! Pure primitives for the Molecula ledger client: wallets, atoms, molecules,
//! one-time signatures and validation.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over SHAKE256-derived key material and ordered atom lists.
//!
//! ## Key Types
//!
//! - [`Wallet`] - One signing position of one token under one [`Secret`]
//! - [`Atom`] - A single ledger operation, tagged by its [`Isotope`]
//! - [`Molecule`] - An ordered, signed collection of atoms
//! - [`CheckMolecule`] - The validator every receiving node runs
//!
//! ## Hashing
//!
//! The molecular hash is a SHAKE256 sponge over every atom's canonical
//! strings, rendered in base 17. See the [`canonical`] module.

pub mod atom;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod meta;
pub mod molecule;
pub mod ots;
pub mod policy;
pub mod rule;
pub mod types;
pub mod validation;
pub mod wallet;

pub use atom::{atoms_by_isotope, sort_atoms, Atom};
pub use canonical::hash_atoms;
pub use crypto::{shake256, Shake256Sponge};
pub use error::{
    BatchError, CoreError, CredentialError, PolicyError, Result, SignatureError, StructureError,
    TransferError,
};
pub use meta::{aggregate_meta, meta_from_pairs, normalize_meta, AtomMeta, MetaItem};
pub use molecule::{Molecule, SignOptions};
pub use policy::PolicyMeta;
pub use rule::{Callback, Comparison, Condition, Rule};
pub use types::{Isotope, AUTH_TOKEN, IDENTITY_TOKEN};
pub use validation::{validate_molecule, CheckMolecule};
pub use wallet::{generate_address, generate_key, generate_position, Secret, TokenUnit, Wallet};
