//! Encode sessions: one timeline pushed through one encoder.

/// Session state machine and async driver.
pub mod encode_session;
