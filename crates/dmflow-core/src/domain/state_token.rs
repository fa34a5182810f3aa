//! State token - per-attempt anti-CSRF correlation value

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque state token bound to exactly one connection attempt.
///
/// The raw value is never printed: `Debug` and `Display` only show the
/// first characters, which is enough to correlate log lines.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct StateToken(String);

impl StateToken {
    /// Number of characters shown in logs
    const LOG_PREFIX_LEN: usize = 8;

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare a returned state against this token.
    ///
    /// Runs in time independent of where the first differing byte is.
    /// An empty token never matches anything.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.is_empty() || expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Short prefix safe to include in log output
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(Self::LOG_PREFIX_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateToken({}…)", self.short())
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.short())
    }
}
