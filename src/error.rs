use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to parse database URL: {0}")]
    UrlParse(String),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Failed to create database: {0}")]
    CreateDb(String),
    #[error("Failed to create schema: {0}")]
    Schema(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by an auth provider.
///
/// The `Display` text is what the user sees, so each variant renders as a
/// complete sentence.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("The email address or password is incorrect.")]
    InvalidCredentials,
    #[error("The email address is already in use by another account.")]
    EmailInUse,
    #[error("The email address is badly formatted.")]
    InvalidEmail,
    #[error("The password must be at least {0} characters long.")]
    WeakPassword(usize),
    #[error("{0}")]
    Provider(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum PharmacyError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Medicine id is missing")]
    MissingId,
    #[error("You need to log in first")]
    NotAuthenticated,
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Name, address and phone number are all required")]
    IncompleteBuyer,
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type PharmacyResult<T> = Result<T, PharmacyError>;
