use std::fmt;

use vilaw_core::{VilawError, VilawResult};

/// One API key/secret identifying a billing account against the inference
/// backend. Immutable once loaded; owned by the [`CredentialPool`] for the
/// process lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building the Authorization header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep secrets out of logs; the last 4 chars are enough to tell
        // credentials apart when debugging rotation.
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "Credential(…{tail})")
    }
}

/// An ordered, fixed set of interchangeable credentials for one logical
/// backend.
///
/// The order is significant: it defines round-robin rotation order and is
/// exactly the order the credentials were configured in, never sorted or
/// shuffled.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// Build a pool from configured secrets.
    ///
    /// A pool of zero credentials is not a valid dispatcher and fails with
    /// [`VilawError::Config`].
    pub fn new(secrets: Vec<String>) -> VilawResult<Self> {
        if secrets.is_empty() {
            return Err(VilawError::Config(
                "credential pool is empty: at least one API key is required".to_string(),
            ));
        }
        Ok(Self {
            credentials: secrets.into_iter().map(Credential::new).collect(),
        })
    }

    /// Number of credentials in the pool. Always >= 1.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// A constructed pool is never empty; this exists for clippy's sake.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The credential at `index`. Callers keep indices in `0..len()`.
    pub fn get(&self, index: usize) -> &Credential {
        &self.credentials[index]
    }
}
