//! Pre-shared secret check for inbound job callbacks.
//!
//! Both the configured and the presented secret are reduced to HMAC-SHA256
//! tags over a fixed context string and compared with
//! [`Mac::verify_slice`], so the comparison time does not depend on where
//! the secrets differ or on the presented secret's length.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation context for the secret tags.
const TAG_CONTEXT: &[u8] = b"pixeltrace.callback.v1";

/// Verifies that a callback came from the authorized job runner.
#[derive(Clone)]
pub struct CallbackAuthenticator {
    expected_tag: Option<Vec<u8>>,
}

impl std::fmt::Debug for CallbackAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackAuthenticator")
            .field("enforcing", &self.is_enforcing())
            .finish()
    }
}

impl CallbackAuthenticator {
    /// `None` (or an empty secret) disables verification entirely.
    pub fn new(secret: Option<&str>) -> Self {
        let expected_tag = secret
            .filter(|s| !s.is_empty())
            .map(|s| tag(s).finalize().into_bytes().to_vec());
        Self { expected_tag }
    }

    /// `false` when no secret is configured.
    pub fn is_enforcing(&self) -> bool {
        self.expected_tag.is_some()
    }

    /// Check a presented secret. A missing secret fails when one is configured.
    pub fn verify(&self, presented: Option<&str>) -> bool {
        let Some(expected) = &self.expected_tag else {
            return true;
        };
        let Some(presented) = presented else {
            return false;
        };
        tag(presented).verify_slice(expected).is_ok()
    }
}

fn tag(secret: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(TAG_CONTEXT);
    mac
}
