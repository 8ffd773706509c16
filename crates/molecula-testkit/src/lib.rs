//! # Molecula Testkit
//!
//! Testing utilities for Molecula.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Pinned key derivation and molecular hash for the `TESTSEED` secret
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Seeded secrets, wallets and signed molecules
//!
//! ## Golden Vectors
//!
//! ```rust
//! use molecula_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, address) in verify_all_vectors() {
//!     println!("{}: {} ({})", name, address, matches);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use molecula_testkit::generators::{signed_transfer_from_params, TransferParams};
//!
//! proptest! {
//!     #[test]
//!     fn transfers_validate(params: TransferParams) {
//!         let molecule = signed_transfer_from_params(&params);
//!         prop_assert!(molecule.check(Some(&params.source())).is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use molecula_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::with_seed("ALICE");
//! let molecule = fixture.make_meta("profile", "alice", &[("name", "Alice")]);
//! assert!(molecule.check(None).is_ok());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture};
pub use generators::{signed_transfer_from_params, transfer_from_params, TransferParams};
pub use vectors::{all_vectors, golden_transfer, verify_all_vectors, GoldenVector};
