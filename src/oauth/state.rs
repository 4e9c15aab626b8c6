//! OAuth state parameter for CSRF protection.
//!
//! The full state record travels to the provider and back, encoded as
//! URL-safe base64 JSON, so the callback knows which `(org_id, user_id)` it
//! belongs to. The server keeps its own copy; only a callback presenting the
//! currently stored nonce is accepted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Random bytes per nonce (256 bits)
const NONCE_BYTES: usize = 32;

/// Pending authorization for one user of one organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub nonce: String,
    pub user_id: String,
    pub org_id: String,
}

impl OAuthState {
    /// Create a state with a fresh random nonce.
    pub fn generate(user_id: &str, org_id: &str) -> Self {
        Self {
            nonce: generate_nonce(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        }
    }

    /// Encode for the `state` query parameter.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a `state` query parameter. Returns `None` for anything that is
    /// not an encoded state record.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Whether `other` carries the same nonce, compared in constant time.
    pub fn nonce_matches(&self, other: &OAuthState) -> bool {
        self.nonce.as_bytes().ct_eq(other.nonce.as_bytes()).into()
    }
}

/// 32 bytes from the OS CSPRNG, URL-safe base64 without padding.
fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
