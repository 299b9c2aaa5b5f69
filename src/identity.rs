//! Identity seam for attribution fields.
//!
//! The engines never resolve the acting user themselves; the transport
//! layer hands them an [`IdentityProvider`] at construction time, and every
//! `created_by`/`started_by` field is filled through it. This keeps the
//! core free of process-wide globals and makes attribution trivially
//! controllable in tests.

/// Supplies the acting user's identifier for attribution.
pub trait IdentityProvider: Send + Sync {
    /// Identifier of the user on whose behalf the current operation runs.
    fn current_user(&self) -> String;
}

/// Fixed-identity provider.
///
/// The simplest possible implementation: every call attributes to the same
/// user. Suitable for single-operator deployments and tests; a web boundary
/// would supply a request-scoped provider instead.
///
/// # Examples
///
/// ```rust
/// use callweave::identity::{IdentityProvider, StaticIdentity};
///
/// let identity = StaticIdentity::new("ops@example.com");
/// assert_eq!(identity.current_user(), "ops@example.com");
/// ```
#[derive(Clone, Debug)]
pub struct StaticIdentity {
    user: String,
}

impl StaticIdentity {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> String {
        self.user.clone()
    }
}
