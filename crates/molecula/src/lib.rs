//! # Molecula
//!
//! Client facade for a molecular ledger: compose, sign, verify and submit
//! molecules of typed atoms.
//!
//! ## Overview
//!
//! - **Wallets**: one signing position of one token, derived from a secret
//! - **Molecules**: ordered, signed collections of atoms (one transaction)
//! - **One-time signatures**: every position signs exactly one molecule
//! - **Validation**: every molecule is checked before it leaves the client
//!
//! ## Key Concepts
//!
//! - **Remainder wallet**: a full-balance spend sends what is left to a fresh position.
//! - **ContinuID**: identity molecules chain the `USER` wallet to its next position.
//! - **Sink**: the boundary where signed molecules leave the client.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use molecula::{Composer, ComposerConfig, MemorySink};
//! use molecula::core::{Secret, Wallet};
//! use rust_decimal::Decimal;
//!
//! async fn example() -> molecula::Result<()> {
//!     let secret = Secret::from_seed("my seed phrase");
//!     let composer = Composer::new(secret.clone(), MemorySink::new(), ComposerConfig::default());
//!
//!     // The wallet being spent, with the balance reported by the ledger
//!     let source = Wallet::create(&secret, "TOKEN")?.with_balance(Decimal::new(100, 0));
//!     let recipient = Wallet::create(&Secret::random(), "TOKEN")?;
//!
//!     let molecule = composer.transfer(source, &recipient, Decimal::new(25, 0)).await?;
//!     println!("submitted {:?}", molecule.molecular_hash);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `molecula::core` - Core primitives (Wallet, Atom, Molecule, CheckMolecule)

pub mod composer;
pub mod error;
pub mod sink;

// Re-export component crates
pub use molecula_core as core;

// Re-export main types for convenience
pub use composer::{Composer, ComposerConfig};
pub use error::{Result, SdkError};
pub use sink::{LedgerSink, MemorySink, SinkError, SubmitResult};

// Re-export commonly used core types
pub use molecula_core::{
    Atom, CheckMolecule, CoreError, Isotope, MetaItem, Molecule, PolicyMeta, Rule, Secret,
    SignOptions, Wallet,
};
