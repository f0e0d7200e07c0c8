//! In-process backend used by tests and when no database is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::{
    normalize_email, validate_credentials, AuthProvider, PharmacyStore, SaleCommit,
};
use crate::db::models::{AuthUser, Medicine, Role, Sale, UserProfile};
use crate::error::{AuthError, StoreError, StoreResult};

#[derive(Default)]
struct UserRecord {
    role: Option<Role>,
    profile: Option<UserProfile>,
}

/// Store whose collections live in `watch` channels, so every write is
/// immediately visible to subscribers.
pub struct MemoryStore {
    medicines: watch::Sender<Vec<Medicine>>,
    sales: watch::Sender<Vec<Sale>>,
    users: Mutex<HashMap<String, UserRecord>>,
    // Serializes writers so a sale commit sees a stable stock value.
    write_lock: Mutex<()>,
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (medicines, _) = watch::channel(Vec::new());
        let (sales, _) = watch::channel(Vec::new());
        MemoryStore {
            medicines,
            sales,
            users: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PharmacyStore for MemoryStore {
    async fn medicines(&self) -> StoreResult<Vec<Medicine>> {
        self.check_available()?;
        Ok(self.medicines.borrow().clone())
    }

    async fn put_medicine(&self, medicine: &Medicine) -> StoreResult<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock().await;
        let medicine = medicine.clone();
        self.medicines.send_modify(|list| {
            match list.iter_mut().find(|m| m.id == medicine.id) {
                Some(existing) => *existing = medicine,
                None => list.push(medicine),
            }
        });
        Ok(())
    }

    async fn remove_medicine(&self, id: &str) -> StoreResult<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock().await;
        self.medicines.send_if_modified(|list| {
            let before = list.len();
            list.retain(|m| m.id != id);
            list.len() != before
        });
        Ok(())
    }

    async fn sales(&self) -> StoreResult<Vec<Sale>> {
        self.check_available()?;
        Ok(self.sales.borrow().clone())
    }

    async fn commit_sale(&self, sale: &Sale) -> StoreResult<SaleCommit> {
        self.check_available()?;
        let _guard = self.write_lock.lock().await;

        let current = self
            .medicines
            .borrow()
            .iter()
            .find(|m| m.id == sale.medicine_id)
            .cloned();
        let Some(mut medicine) = current else {
            return Ok(SaleCommit::MissingMedicine);
        };
        if medicine.stock < sale.quantity {
            return Ok(SaleCommit::InsufficientStock {
                available: medicine.stock,
            });
        }

        medicine.stock -= sale.quantity;
        let updated = medicine.clone();
        self.medicines.send_modify(|list| {
            if let Some(existing) = list.iter_mut().find(|m| m.id == updated.id) {
                *existing = updated;
            }
        });
        let sale = sale.clone();
        self.sales.send_modify(|list| list.push(sale));
        Ok(SaleCommit::Committed(medicine))
    }

    async fn role(&self, uid: &str) -> StoreResult<Option<Role>> {
        self.check_available()?;
        Ok(self.users.lock().await.get(uid).and_then(|u| u.role))
    }

    async fn set_role(&self, uid: &str, role: Role) -> StoreResult<()> {
        self.check_available()?;
        self.users
            .lock()
            .await
            .entry(uid.to_string())
            .or_default()
            .role = Some(role);
        Ok(())
    }

    async fn profile(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        self.check_available()?;
        Ok(self
            .users
            .lock()
            .await
            .get(uid)
            .and_then(|u| u.profile.clone()))
    }

    async fn set_profile(&self, uid: &str, profile: &UserProfile) -> StoreResult<()> {
        self.check_available()?;
        self.users
            .lock()
            .await
            .entry(uid.to_string())
            .or_default()
            .profile = Some(profile.clone());
        Ok(())
    }

    fn watch_medicines(&self) -> watch::Receiver<Vec<Medicine>> {
        self.medicines.subscribe()
    }

    fn watch_sales(&self) -> watch::Receiver<Vec<Sale>> {
        self.sales.subscribe()
    }
}

struct Account {
    uid: String,
    password: String,
}

/// Email/password provider that keeps accounts in memory.
#[derive(Default)]
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    current: RwLock<Option<AuthUser>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_current(&self, user: Option<AuthUser>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = user;
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email);
        let accounts = self.accounts.lock().await;
        let account = accounts
            .get(&email)
            .filter(|account| account.password == password)
            .ok_or(AuthError::InvalidCredentials)?;
        let user = AuthUser {
            uid: account.uid.clone(),
            email,
        };
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        validate_credentials(email, password)?;
        let email = normalize_email(email);
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }
        let uid = uuid::Uuid::new_v4().to_string();
        accounts.insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        let user = AuthUser { uid, email };
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self, uid: &str) -> Result<(), AuthError> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if current.as_ref().is_some_and(|user| user.uid == uid) {
            *current = None;
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Buyer;

    fn paracetamol() -> Medicine {
        Medicine::new("Paracetamol", "Pain reliever", 2.5, 5, "Pain Relief").with_id("med-1")
    }

    #[tokio::test]
    async fn put_replaces_by_id_and_notifies_watchers() {
        let store = MemoryStore::new();
        let mut rx = store.watch_medicines();

        store.put_medicine(&paracetamol()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        let mut edited = paracetamol();
        edited.price = 3.0;
        store.put_medicine(&edited).await.unwrap();
        let list = store.medicines().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].price, 3.0);
    }

    #[tokio::test]
    async fn commit_sale_rechecks_stock() {
        let store = MemoryStore::new();
        store.put_medicine(&paracetamol()).await.unwrap();
        let buyer = Buyer::new("Jane", "Street 1", "555");

        let outcome = store.commit_sale(&Sale::new("med-1", 6, &buyer)).await.unwrap();
        assert_eq!(outcome, SaleCommit::InsufficientStock { available: 5 });
        assert!(store.sales().await.unwrap().is_empty());

        let outcome = store.commit_sale(&Sale::new("med-1", 5, &buyer)).await.unwrap();
        assert!(matches!(outcome, SaleCommit::Committed(ref m) if m.stock == 0));
        assert_eq!(store.sales().await.unwrap().len(), 1);

        let outcome = store.commit_sale(&Sale::new("missing", 1, &buyer)).await.unwrap();
        assert_eq!(outcome, SaleCommit::MissingMedicine);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.medicines().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.set_role("uid", Role::User).await.is_err());
        store.set_unavailable(false);
        assert!(store.set_role("uid", Role::User).await.is_ok());
    }

    #[tokio::test]
    async fn auth_rejects_duplicates_and_bad_passwords() {
        let auth = MemoryAuth::new();
        let user = auth.sign_up("Jane@Example.com", "secret1").await.unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(auth.current_user(), Some(user.clone()));

        assert!(matches!(
            auth.sign_up("jane@example.com", "another1").await,
            Err(AuthError::EmailInUse)
        ));
        assert!(matches!(
            auth.sign_in("jane@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredentials)
        ));

        auth.sign_out(&user.uid).await.unwrap();
        assert_eq!(auth.current_user(), None);
        let again = auth.sign_in("jane@example.com", "secret1").await.unwrap();
        assert_eq!(again.uid, user.uid);
    }

    #[tokio::test]
    async fn current_user_tracks_the_last_sign_in_only() {
        let auth = MemoryAuth::new();
        let jane = auth.sign_up("jane@example.com", "secret1").await.unwrap();
        let sam = auth.sign_up("sam@example.com", "secret2").await.unwrap();
        assert_eq!(auth.current_user(), Some(sam.clone()));

        auth.sign_out(&jane.uid).await.unwrap();
        assert_eq!(auth.current_user(), Some(sam.clone()));

        auth.sign_out(&sam.uid).await.unwrap();
        assert_eq!(auth.current_user(), None);
    }
}
