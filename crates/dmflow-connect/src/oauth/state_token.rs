//! State Token Generator
//!
//! Produces the per-attempt anti-CSRF value. A missing CSPRNG is a startup
//! problem of the host, not a per-call error, so generation never fails.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dmflow_core::StateToken;
use rand::RngCore;

/// Number of random bytes per token (256 bits)
const STATE_TOKEN_BYTES: usize = 32;

/// Source of state tokens, injectable for deterministic tests
pub trait StateTokenSource: Send + Sync {
    fn generate(&self) -> StateToken;
}

/// Default source backed by the thread-local CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStateTokens;

impl StateTokenSource for RandomStateTokens {
    fn generate(&self) -> StateToken {
        generate_state()
    }
}

/// Generate a random, URL-safe state token
pub fn generate_state() -> StateToken {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    StateToken::new(URL_SAFE_NO_PAD.encode(bytes))
}
