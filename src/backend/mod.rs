//! Capability seams for the hosted backend.
//!
//! The pharmacy only ever talks to a [`PharmacyStore`] and an [`AuthProvider`],
//! so the Postgres implementations can be swapped for the in-memory ones in tests
//! or when no database is configured.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::db::models::{AuthUser, Medicine, Role, Sale, UserProfile};
use crate::error::{AuthError, StoreResult};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryAuth, MemoryStore};
pub use postgres::{PgAuth, PgStore};

/// Minimum password length accepted on sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Outcome of an atomic stock-decrement-plus-sale commit.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleCommit {
    /// Stock was decremented and the sale appended; carries the updated medicine.
    Committed(Medicine),
    /// The medicine no longer exists in the store.
    MissingMedicine,
    /// The store's current stock is below the requested quantity.
    InsufficientStock { available: i32 },
}

/// Keyed collections `medicines`, `sales`, `users/{uid}/role` and
/// `users/{uid}/profile`, with snapshot subscriptions on the two catalog
/// collections.
#[async_trait]
pub trait PharmacyStore: Send + Sync {
    async fn medicines(&self) -> StoreResult<Vec<Medicine>>;

    /// Inserts or replaces the medicine stored under `medicine.id`.
    async fn put_medicine(&self, medicine: &Medicine) -> StoreResult<()>;

    /// Removes the medicine stored under `id`. Removing an absent id is not an error.
    async fn remove_medicine(&self, id: &str) -> StoreResult<()>;

    async fn sales(&self) -> StoreResult<Vec<Sale>>;

    /// Decrements the referenced medicine's stock by `sale.quantity` and appends
    /// `sale`, as one unit. Nothing is written unless both succeed.
    async fn commit_sale(&self, sale: &Sale) -> StoreResult<SaleCommit>;

    async fn role(&self, uid: &str) -> StoreResult<Option<Role>>;
    async fn set_role(&self, uid: &str, role: Role) -> StoreResult<()>;

    async fn profile(&self, uid: &str) -> StoreResult<Option<UserProfile>>;
    async fn set_profile(&self, uid: &str, profile: &UserProfile) -> StoreResult<()>;

    /// Live view of the `medicines` collection; the value is replaced wholesale on every change.
    fn watch_medicines(&self) -> watch::Receiver<Vec<Medicine>>;

    /// Live view of the `sales` collection.
    fn watch_sales(&self) -> watch::Receiver<Vec<Sale>>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;
    /// Forgets `uid` if it is the provider's current user; other identities are untouched.
    async fn sign_out(&self, uid: &str) -> Result<(), AuthError>;

    /// The last identity signed in through this provider in this process, unless
    /// it has since signed out. One provider serves every chat, so this is not a
    /// per-session identity; sessions keep their own user in
    /// [`crate::services::Session`].
    fn current_user(&self) -> Option<AuthUser>;
}

/// Checks shared by every provider before an account is created.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid_email || email.contains(char::is_whitespace) {
        return Err(AuthError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
    }
    Ok(())
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_email_shape_and_password_length() {
        assert!(validate_credentials("jane@example.com", "secret1").is_ok());
        assert!(matches!(
            validate_credentials("jane.example.com", "secret1"),
            Err(AuthError::InvalidEmail)
        ));
        assert!(matches!(
            validate_credentials("jane@localhost", "secret1"),
            Err(AuthError::InvalidEmail)
        ));
        assert!(matches!(
            validate_credentials("jane@example.com", "123"),
            Err(AuthError::WeakPassword(MIN_PASSWORD_LEN))
        ));
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }
}
