use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;

use super::canonical::canonical_message;
use crate::keys::KeySource;

/// Trait for verifying callback signatures
///
/// The result is strictly boolean: every parse, decode, or import failure
/// reduces to `false` with the cause logged. Nothing propagates to the
/// caller.
#[async_trait]
pub trait CallbackVerifier: Send + Sync {
    /// Verify the detached signature over the raw, originally-ordered query
    ///
    /// # Arguments
    ///
    /// * `raw_query` - The callback query string exactly as received
    /// * `signature` - The detached signature, URL-safe base64
    /// * `key_id` - The directory key id the network signed with
    async fn verify(&self, raw_query: &str, signature: &str, key_id: &str) -> bool;
}

/// ECDSA P-256 / SHA-256 verifier backed by the key directory cache
///
/// This is the scheme rewarded-ad networks sign their server-side
/// verification callbacks with: the canonical message is UTF-8, the
/// signature is an ASN.1 DER sequence of (r, s), and the directory publishes
/// keys as base64 SubjectPublicKeyInfo blobs.
pub struct EcdsaCallbackVerifier {
    keys: Arc<dyn KeySource>,
}

impl EcdsaCallbackVerifier {
    pub fn new(keys: Arc<dyn KeySource>) -> Self {
        Self { keys }
    }
}

/// Convert URL-safe base64 to standard base64 with padding
///
/// The network transmits signatures with the URL-safe alphabet and no
/// padding; the decoder expects the standard alphabet padded to a multiple
/// of four.
fn normalize_base64url(signature: &str) -> String {
    let mut normalized = signature.replace('-', "+").replace('_', "/");
    match normalized.len() % 4 {
        2 => normalized.push_str("=="),
        3 => normalized.push('='),
        _ => {}
    }
    normalized
}

#[async_trait]
impl CallbackVerifier for EcdsaCallbackVerifier {
    async fn verify(&self, raw_query: &str, signature: &str, key_id: &str) -> bool {
        if raw_query.is_empty() || signature.is_empty() || key_id.is_empty() {
            tracing::warn!("verification failed: missing query, signature, or key id");
            return false;
        }

        let key_id: i64 = match key_id.parse() {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(key_id, "verification failed: unparseable key id");
                return false;
            }
        };

        let material = match self.keys.key(key_id).await {
            Some(material) => material,
            None => {
                tracing::warn!(key_id, "verification failed: no key for key id");
                return false;
            }
        };

        let verifying_key = match VerifyingKey::from_public_key_der(&material) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(key_id, error = %err, "verification failed: key material not importable");
                return false;
            }
        };

        let signature_bytes = match BASE64_STANDARD.decode(normalize_base64url(signature)) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(key_id, error = %err, "verification failed: signature is not base64");
                return false;
            }
        };

        let signature = match Signature::from_der(&signature_bytes) {
            Ok(signature) => signature,
            Err(err) => {
                tracing::debug!(key_id, error = %err, "verification failed: signature is not a DER sequence");
                return false;
            }
        };

        let message = canonical_message(raw_query);
        let is_valid = verifying_key.verify(message.as_bytes(), &signature).is_ok();
        if !is_valid {
            tracing::debug!(key_id, "signature did not verify against canonical message");
        }
        is_valid
    }
}
