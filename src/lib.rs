pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod services;
pub mod utils;

pub use backend::{AuthProvider, MemoryAuth, MemoryStore, PgAuth, PgStore, PharmacyStore, SaleCommit};
pub use db::models::{AuthUser, Buyer, Medicine, Role, Sale, UserProfile};
pub use error::{AuthError, PharmacyError, PharmacyResult, StoreError, StoreResult};
pub use services::{Cart, Pharmacy, Receipt, Session};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
