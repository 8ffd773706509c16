//! Golden test vectors for deterministic verification.
//!
//! These vectors pin key derivation and the molecular hash, so every
//! implementation derives identical bundles, addresses and hashes from the
//! same seed.

use molecula_core::{CoreError, Molecule, Secret, Wallet};
use rust_decimal::Decimal;
use serde::Serialize;

/// Seed phrase used by every vector.
pub const GOLDEN_SEED: &str = "TESTSEED";

/// Position used by the wallet vectors.
pub const GOLDEN_POSITION: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// First 64 characters of the secret derived from [`GOLDEN_SEED`].
pub const GOLDEN_SECRET_PREFIX: &str = "e8ffc86d60fc6a73234a834166e7436e21df6c3209dfacc8d0bd6595707872c3";

/// Bundle hash of the secret derived from [`GOLDEN_SEED`].
pub const GOLDEN_BUNDLE: &str = "2b77ff69a6d2f8108250389377faa6cbd42caaefa2f966e1b68a4b3fc022c83e";

/// Molecular hash of [`golden_transfer`].
pub const GOLDEN_TRANSFER_HASH: &str =
    "03g4c72333f9a6cc4b6ed9ecee7fbc3ce050g86834bf13bf1584c691f7fc9cbf";

/// A golden wallet vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed phrase for the secret.
    pub seed: &'static str,
    /// Token slug.
    pub token: &'static str,
    /// Signing position.
    pub position: &'static str,
    /// Expected first 64 characters of the private key.
    pub expected_key_prefix: &'static str,
    /// Expected wallet address.
    pub expected_address: &'static str,
}

/// Get all golden wallet vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "TEST token at the golden position",
            seed: GOLDEN_SEED,
            token: "TEST",
            position: GOLDEN_POSITION,
            expected_key_prefix: "dd00fea5b486c5c7a54e41dc4abfd7a2687e9de458139ac5c4d15d3cd27b8e7d",
            expected_address: "4e1f65971f115f0365a800a49fd220139f8d6f26f66898b123ac3e79a580af8c",
        },
        GoldenVector {
            name: "USER token at the golden position",
            seed: GOLDEN_SEED,
            token: "USER",
            position: GOLDEN_POSITION,
            expected_key_prefix: "4ced6cceb929f8fd82c9d366d70f9d39d9d03599ad63396f4cecf224ae678285",
            expected_address: "851610cac2b37c27d63c0e4564ce4154fa555de5d40d1d7acbdc26a2f195a4fa",
        },
        GoldenVector {
            name: "TEST token at an all-ones position",
            seed: GOLDEN_SEED,
            token: "TEST",
            position: "1111111111111111111111111111111111111111111111111111111111111111",
            expected_key_prefix: "bf6c6080ddb09cbd0aa696a9fbe97eb04c5ac2e3e528699d2b2b7b85430a5966",
            expected_address: "80977fe0990111668a580b76a05e88ba1ff646126fff6a39402a983ba9662c7a",
        },
    ]
}

/// Derive the wallet a vector describes.
pub fn wallet_from_vector(vector: &GoldenVector) -> Result<Wallet, CoreError> {
    Wallet::new(&Secret::from_seed(vector.seed), vector.token, Some(vector.position))
}

/// Verify all golden vectors produce their expected addresses.
///
/// Returns `(name, matches, address)` for each vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let Ok(wallet) = wallet_from_vector(v) else {
                return (v.name.to_string(), false, String::new());
            };
            let address = wallet.address.clone().unwrap_or_default();
            let key = wallet.private_key().unwrap_or_default();

            let matches = address == v.expected_address && key.starts_with(v.expected_key_prefix);

            (v.name.to_string(), matches, address)
        })
        .collect()
}

/// All golden wallet vectors as pretty JSON, for other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

/// The golden transfer: 1000 TEST from the golden secret at position `1…1`
/// to the `RECIPIENT` secret at `2…2`, remainder at `3…3`. Unsigned.
pub fn golden_transfer() -> Result<Molecule, CoreError> {
    let secret = Secret::from_seed(GOLDEN_SEED);
    let source = Wallet::new(&secret, "TEST", Some("1".repeat(64).as_str()))?.with_balance(Decimal::new(1000, 0));
    let remainder = Wallet::new(&secret, "TEST", Some("3".repeat(64).as_str()))?;
    let recipient = Wallet::new(&Secret::from_seed("RECIPIENT"), "TEST", Some("2".repeat(64).as_str()))?;

    let mut molecule = Molecule::new(secret, source)?
        .with_remainder(remainder)
        .with_created_at("1700000000000");
    molecule.init_value(&recipient, Decimal::new(1000, 0))?;
    Ok(molecule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use molecula_core::{hash_atoms, SignOptions};

    #[test]
    fn test_secret_and_bundle() {
        let secret = Secret::from_seed(GOLDEN_SEED);
        assert!(secret.as_str().starts_with(GOLDEN_SECRET_PREFIX));
        assert_eq!(secret.bundle_hash(), GOLDEN_BUNDLE);
    }

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, address) in verify_all_vectors() {
            assert!(matches, "vector '{}' derived {}", name, address);
        }
    }

    #[test]
    fn test_vectors_pin_key_and_address() {
        for vector in all_vectors() {
            assert_eq!(vector.expected_key_prefix.len(), 64, "vector '{}'", vector.name);
            let wallet = wallet_from_vector(&vector).unwrap();
            let key = wallet.private_key().unwrap();
            assert_eq!(&key[..64], vector.expected_key_prefix, "vector '{}'", vector.name);
            assert_eq!(wallet.address.as_deref(), Some(vector.expected_address));
        }
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let w1 = wallet_from_vector(&vector).unwrap();
            let w2 = wallet_from_vector(&vector).unwrap();
            assert_eq!(w1.address, w2.address, "vector '{}' is not deterministic", vector.name);
            assert_eq!(w1.bundle.as_deref(), Some(GOLDEN_BUNDLE));
        }
    }

    #[test]
    fn test_vectors_json_lists_addresses() {
        let json = vectors_json().unwrap();
        for vector in all_vectors() {
            assert!(json.contains(vector.expected_address));
        }
    }

    #[test]
    fn test_golden_transfer_hash() {
        let mut molecule = golden_transfer().unwrap();
        assert_eq!(hash_atoms(molecule.atoms()).unwrap(), GOLDEN_TRANSFER_HASH);
        assert_eq!(molecule.sign(SignOptions::default()).unwrap(), GOLDEN_TRANSFER_HASH);
    }
}
