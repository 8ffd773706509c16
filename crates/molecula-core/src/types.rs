//! Protocol constants and the isotope discriminator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token slug of the identity (ContinuID) token.
pub const IDENTITY_TOKEN: &str = "USER";

/// Token slug used by authorization atoms.
pub const AUTH_TOKEN: &str = "AUTH";

/// The operation type of an atom.
///
/// Serialized as its single-character tag, which is part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Isotope {
    /// Value transfer.
    V,
    /// Generic metadata.
    M,
    /// Token creation.
    T,
    /// Wallet creation.
    C,
    /// ContinuID: chains an identity to its next signing position.
    I,
    /// Authorization.
    U,
    /// Rule / policy.
    R,
}

impl Isotope {
    /// All isotopes in sort-priority order.
    pub const ALL: [Isotope; 7] = [
        Isotope::V,
        Isotope::M,
        Isotope::T,
        Isotope::C,
        Isotope::U,
        Isotope::R,
        Isotope::I,
    ];

    /// The wire tag.
    pub fn as_char(self) -> char {
        match self {
            Isotope::V => 'V',
            Isotope::M => 'M',
            Isotope::T => 'T',
            Isotope::C => 'C',
            Isotope::I => 'I',
            Isotope::U => 'U',
            Isotope::R => 'R',
        }
    }

    /// Parse a wire tag.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'V' => Some(Isotope::V),
            'M' => Some(Isotope::M),
            'T' => Some(Isotope::T),
            'C' => Some(Isotope::C),
            'I' => Some(Isotope::I),
            'U' => Some(Isotope::U),
            'R' => Some(Isotope::R),
            _ => None,
        }
    }

    /// Primary sort key for atoms within a molecule.
    ///
    /// ContinuID atoms always trail, so the signing atom of every builder
    /// stays at position zero.
    pub fn priority(self) -> u8 {
        match self {
            Isotope::V => 0,
            Isotope::M => 1,
            Isotope::T => 2,
            Isotope::C => 3,
            Isotope::U => 4,
            Isotope::R => 5,
            Isotope::I => 6,
        }
    }
}

impl fmt::Display for Isotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
