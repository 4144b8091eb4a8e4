//! Authorization hook run after authentication.

use crate::claims::Claims;
use crate::errors::AuthError;

/// Decides whether authenticated claims may proceed.
///
/// Implemented for closures so simple checks can be written inline:
///
/// ```
/// use jwtauth::{AuthError, Authoriser, Claims};
///
/// let admin_only = |claims: &Claims| {
///     if claims.has_scope("admin") {
///         Ok(())
///     } else {
///         Err(AuthError::insufficient_permissions("admin scope required"))
///     }
/// };
/// assert!(admin_only.authorise(&Claims::default()).is_err());
/// ```
pub trait Authoriser: Send + Sync {
    /// # Errors
    ///
    /// Returns an `AuthError`, normally `InsufficientPermissions`, to deny.
    fn authorise(&self, claims: &Claims) -> Result<(), AuthError>;
}

impl<F> Authoriser for F
where
    F: Fn(&Claims) -> Result<(), AuthError> + Send + Sync,
{
    fn authorise(&self, claims: &Claims) -> Result<(), AuthError> {
        self(claims)
    }
}
