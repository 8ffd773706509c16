//! Canonical molecular hash.
//!
//! The hash is the integrity anchor every receiving node recomputes, so its
//! input must be reproduced exactly:
//!
//! 1. Sort atoms by isotope priority, then index.
//! 2. For each atom, absorb the atom count (decimal text), then every string
//!    from [`Atom::hashable_values`], into a single SHAKE256 sponge.
//! 3. Squeeze 256 bits and re-encode the number in base 17 (`0-9a-g`),
//!    left-padded with `0` to 64 characters.

use crate::atom::{sort_atoms, Atom};
use crate::crypto::{hex_to_base17, Shake256Sponge, DIGEST_LENGTH};
use crate::error::{Result, StructureError};

/// Compute the molecular hash of a set of atoms.
pub fn hash_atoms(atoms: &[Atom]) -> Result<String> {
    if atoms.is_empty() {
        return Err(StructureError::AtomsMissing("cannot hash an empty molecule".into()).into());
    }

    let mut sorted = atoms.to_vec();
    sort_atoms(&mut sorted);

    let atom_count = sorted.len().to_string();
    let mut sponge = Shake256Sponge::new();
    for atom in &sorted {
        sponge.absorb(&atom_count);
        for value in atom.hashable_values() {
            sponge.absorb(value);
        }
    }

    hex_to_base17(&sponge.squeeze(256), DIGEST_LENGTH)
}
