//! OAuth pieces that talk to the backend or produce secrets
//!
//! - State token generation (anti-CSRF)
//! - Code exchange against the dashboard API

mod exchange;
mod state_token;

pub use exchange::{AuthUrlGrant, ConnectBackend, ExchangeOutcome, HttpConnectBackend};
pub use state_token::{generate_state, RandomStateTokens, StateTokenSource};
