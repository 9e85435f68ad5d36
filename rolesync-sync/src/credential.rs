//! Opaque bearer credential passed into every remote operation.

use std::fmt;

use crate::error::ReconcileError;

/// Token forwarded unmodified to the remote service.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Rejects empty or blank tokens before any network I/O.
    pub fn new(token: impl Into<String>) -> Result<Self, ReconcileError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ReconcileError::Auth {
                reason: "no credential supplied".to_string(),
            });
        }
        Ok(Self(token))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
