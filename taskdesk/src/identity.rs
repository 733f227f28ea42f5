//! Identity provider boundary.
//!
//! The task core only needs to know who is signed in and when that changes.
//! [`LocalIdentity`] is the in-process provider used by the console and tests;
//! a hosted auth SDK would implement [`IdentityProvider`] the same way.

use std::fmt;

use tokio::sync::watch;

/// Identifier of an authenticated principal (the hosted auth user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the current principal and of principal changes.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in principal, if any.
    fn current_principal(&self) -> Option<PrincipalId>;

    /// Receiver that is notified every time the principal changes.
    fn principal_changes(&self) -> watch::Receiver<Option<PrincipalId>>;
}

/// In-process identity provider backed by a [`watch`] channel.
#[derive(Debug)]
pub struct LocalIdentity {
    tx: watch::Sender<Option<PrincipalId>>,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    /// Creates a provider with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Creates a provider with `principal` already signed in.
    #[must_use]
    pub fn signed_in(principal: PrincipalId) -> Self {
        let (tx, _rx) = watch::channel(Some(principal));
        Self { tx }
    }

    /// Signs `principal` in, replacing whoever was signed in.
    pub fn sign_in(&self, principal: PrincipalId) {
        tracing::info!(%principal, "signed in");
        self.tx.send_replace(Some(principal));
    }

    /// Signs the current principal out.
    pub fn sign_out(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            tracing::info!(principal = %previous, "signed out");
        }
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_principal(&self) -> Option<PrincipalId> {
        self.tx.borrow().clone()
    }

    fn principal_changes(&self) -> watch::Receiver<Option<PrincipalId>> {
        self.tx.subscribe()
    }
}
