//! Claim codes: short random tokens bound 1:1 to an order at placement.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default generated code length, in hex characters.
pub const DEFAULT_CLAIM_CODE_LEN: usize = 8;

const HEX_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// A claim code. Immutable, case-sensitive, compared exactly.
///
/// Redemption transitions the owning order out of the redeemable states, so
/// a code is effectively single-use even though it is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimCode(String);

impl ClaimCode {
    /// Wrap an existing code (rehydration, tests).
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generate a fresh random code of `len` lowercase hex characters.
    ///
    /// Generation happens at the service boundary, never inside the
    /// aggregate: `handle` stays pure and deterministic.
    pub fn generate(len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..len)
            .map(|_| HEX_ALPHABET[rng.gen_range(0..HEX_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact, case-sensitive comparison against a supplied string.
    pub fn matches(&self, supplied: &str) -> bool {
        self.0 == supplied
    }
}

impl core::fmt::Display for ClaimCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
