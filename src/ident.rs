//! Identifier allocation for display entities.
//!
//! Group keys (grades) are arbitrary Unicode, renderer ids must be ASCII.
//! Keys are UTF-8 → URL-safe base64 without padding, which is reversible,
//! so two distinct keys never encode to the same text. Collisions with ids
//! already in use (raw node ids, other clusters) are resolved by appending
//! `_1`, `_2`, … until free.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hashbrown::HashSet;

/// ASCII-safe, reversible encoding of a group key.
pub fn encode_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Hands out ids unique within its scope.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with ids that must never be handed out.
    pub fn reserving<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { taken: ids.into_iter().map(Into::into).collect() }
    }

    /// `base` if free, else the first free `base_N`. Unbounded.
    pub fn allocate(&mut self, base: &str) -> String {
        let mut n = 0usize;
        loop {
            let candidate = suffixed(base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Like [`allocate`](Self::allocate) but gives up after `max_attempts`
    /// suffixes, returning the last candidate tried.
    pub fn try_allocate(&mut self, base: &str, max_attempts: usize) -> Result<String, String> {
        for n in 0..=max_attempts {
            let candidate = suffixed(base, n);
            if self.taken.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(suffixed(base, max_attempts))
    }
}

fn suffixed(base: &str, n: usize) -> String {
    if n == 0 { base.to_string() } else { format!("{base}_{n}") }
}
