//! Label-set fingerprints.
//!
//! A fingerprint is a 64-bit FNV-1a hash over the labels sorted by name. Each
//! label contributes its name, a `0xFF` separator, its value and another
//! separator, which matches the fingerprints Alertmanager computes for the
//! same label set.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::types::Labels;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const SEPARATOR: u8 = 0xff;

/// A stable identity hash of a label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Computes the fingerprint of a label set.
    #[must_use]
    pub fn of(labels: &Labels) -> Self {
        Self::from_sorted(labels.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Computes the fingerprint of label pairs given in any order.
    ///
    /// Later duplicates of a label name replace earlier ones.
    #[must_use]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let sorted: std::collections::BTreeMap<&str, &str> = pairs.into_iter().collect();
        Self::from_sorted(sorted.into_iter())
    }

    /// Returns the raw hash value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    fn from_sorted<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Self {
        let mut hash = FNV_OFFSET_BASIS;
        for (name, value) in pairs {
            hash = add_bytes(hash, name.as_bytes());
            hash = add_byte(hash, SEPARATOR);
            hash = add_bytes(hash, value.as_bytes());
            hash = add_byte(hash, SEPARATOR);
        }
        Self(hash)
    }
}

const fn add_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

fn add_bytes(hash: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(hash, |h, b| add_byte(h, *b))
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
