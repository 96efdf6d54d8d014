//! Cooperative job cancellation.
//!
//! Stages are opaque and cannot be interrupted; the executor checks the
//! token between dependency levels.

mod token;

pub use token::CancellationToken;
