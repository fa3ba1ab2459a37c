//! Canonical signature verification for server-side verification callbacks.
//!
//! Reconstructs the exact byte sequence the ad network signed and verifies
//! the detached ECDSA signature against a key from the directory cache.

pub mod canonical;
pub mod verifier;

pub use canonical::canonical_message;
pub use verifier::{CallbackVerifier, EcdsaCallbackVerifier};
