// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Normalized identity keys for cart entries.

use std::fmt;

/// Normalized identity key for a line item.
///
/// A `Sku` is the cart's notion of identity: the raw id string trimmed and
/// ASCII-lowercased. Two raw ids that normalize to the same string address
/// the same cart entry. A `Sku` is never empty; construction rejects ids
/// that normalize to the empty string.
///
/// The wrapper exists so positions, dirty marks, and row associations cannot
/// be keyed by an un-normalized string by accident.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Sku(String);

impl Sku {
    /// Normalizes `raw` into a `Sku`.
    ///
    /// Returns `None` when the trimmed id is empty — the caller-misuse case
    /// every mutation rejects synchronously.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        Some(Self(normalized))
    }

    /// Returns the normalized id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Sku {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Sku {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <String as serde::Deserialize<'de>>::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom("empty id"))
    }
}
