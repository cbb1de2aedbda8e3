//! Bloom-tier mastery vector.
//!
//! Each knowledge point carries one bit per Bloom taxonomy tier group.
//! Only `0` and `1` are representable: whatever shape the backend stored,
//! [`MasteryVector::coerce`] folds it into exactly three bits.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Number of tier groups tracked per node.
pub const TIER_COUNT: usize = 3;

/// Human-readable tier group names, in vector order.
pub const TIER_NAMES: [&str; TIER_COUNT] = [
    "recall/understand",
    "apply/analyze",
    "evaluate/create",
];

/// Fixed-length binary mastery vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; TIER_COUNT]", into = "[u8; TIER_COUNT]")]
pub struct MasteryVector([u8; TIER_COUNT]);

impl MasteryVector {
    pub const ZERO: Self = Self([0; TIER_COUNT]);

    /// Build from raw tiers. Any non-1 tier becomes 0.
    pub fn new(tiers: [u8; TIER_COUNT]) -> Self {
        Self(tiers.map(|t| u8::from(t == 1)))
    }

    /// Coerce an arbitrary backend value into a mastery vector.
    ///
    /// - 3-element array: element-wise integer cast, non-1 → 0
    /// - anything else: `[bit, 0, 0]`, where a string contributes its integer
    ///   prefix (`"1"`, `"1,0,1"` → 1; `"[1,0,1]"`, `"abc"` → 0), an array
    ///   its first element, and booleans or objects 0
    ///
    /// Never fails.
    pub fn coerce(value: Option<&Json>) -> Self {
        match value {
            None | Some(Json::Null) => Self::ZERO,
            Some(Json::Array(items)) if items.len() == TIER_COUNT => {
                Self([bit(&items[0]), bit(&items[1]), bit(&items[2])])
            }
            Some(other) => Self([bit(other), 0, 0]),
        }
    }

    pub fn tiers(&self) -> [u8; TIER_COUNT] {
        self.0
    }

    /// A node counts as mastered when any tier is set.
    pub fn is_mastered(&self) -> bool {
        self.0.iter().any(|&t| t == 1)
    }

    /// Indices of tiers that differ between `self` and `other`.
    pub fn changed_tiers(&self, other: &MasteryVector) -> Vec<usize> {
        (0..TIER_COUNT).filter(|&i| self.0[i] != other.0[i]).collect()
    }
}

impl From<[u8; TIER_COUNT]> for MasteryVector {
    fn from(tiers: [u8; TIER_COUNT]) -> Self {
        Self::new(tiers)
    }
}

impl From<MasteryVector> for [u8; TIER_COUNT] {
    fn from(v: MasteryVector) -> Self {
        v.0
    }
}

impl fmt::Display for MasteryVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.0[0], self.0[1], self.0[2])
    }
}

fn bit(value: &Json) -> u8 {
    let one = match value {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            == Some(1),
        Json::String(s) => leading_int(s) == Some(1),
        Json::Array(items) => items.first().is_some_and(|first| bit(first) == 1),
        _ => false,
    };
    u8::from(one)
}

/// Integer prefix of a string: `"1"` → 1, `" 1.5x"` → 1, `"abc"` → None.
fn leading_int(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let (sign, digits) = match t.as_bytes().first() {
        Some(b'-') => (-1, &t[1..]),
        Some(b'+') => (1, &t[1..]),
        _ => (1, t),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
