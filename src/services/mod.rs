//! The per-session pharmacy state holder.
//!
//! A [`Pharmacy`] mirrors the store's `medicines` and `sales` collections,
//! keeps a local cart, records sales, and tracks the authentication session
//! and profile of one user. Every session shares the same store and auth
//! provider; only the cart and session are private.

use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::{AuthProvider, PharmacyStore, SaleCommit};
use crate::db::models::{AuthUser, Buyer, Medicine, Role, Sale, UserProfile};
use crate::error::{AuthError, PharmacyError, PharmacyResult};

pub mod cart;
pub mod catalog;

pub use cart::Cart;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated {
        user: AuthUser,
        role: Role,
    },
}

/// Result of a checkout: the sales that were recorded and the cart entries
/// that could not be sold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Receipt {
    pub sales: Vec<Sale>,
    pub rejected: Vec<Medicine>,
    pub total: f64,
}

pub struct Pharmacy {
    store: Arc<dyn PharmacyStore>,
    auth: Arc<dyn AuthProvider>,
    medicines: watch::Receiver<Vec<Medicine>>,
    sales: watch::Receiver<Vec<Sale>>,
    cart: Cart,
    session: Session,
    auth_error: Option<String>,
    profile: UserProfile,
}

impl Pharmacy {
    pub fn new(store: Arc<dyn PharmacyStore>, auth: Arc<dyn AuthProvider>) -> Self {
        let medicines = store.watch_medicines();
        let sales = store.watch_sales();
        Pharmacy {
            store,
            auth,
            medicines,
            sales,
            cart: Cart::new(),
            session: Session::Anonymous,
            auth_error: None,
            profile: UserProfile::default(),
        }
    }

    /// Current snapshot of the mirrored catalog.
    pub fn medicines(&self) -> Vec<Medicine> {
        self.medicines.borrow().clone()
    }

    /// Current snapshot of the mirrored sales history.
    pub fn sales(&self) -> Vec<Sale> {
        self.sales.borrow().clone()
    }

    pub fn get_medicine_by_id(&self, id: &str) -> Option<Medicine> {
        catalog::find_medicine(&self.medicines.borrow(), id).cloned()
    }

    pub fn search(&self, search: &str, category: Option<&str>) -> Vec<Medicine> {
        catalog::filter_medicines(&self.medicines.borrow(), search, category)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn categories(&self) -> Vec<String> {
        catalog::categories(&self.medicines.borrow())
    }

    pub fn low_stock(&self, threshold: i32) -> Vec<Medicine> {
        catalog::low_stock(&self.medicines.borrow(), threshold)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn sales_for_medicine(&self, medicine_id: &str) -> Vec<Sale> {
        catalog::sales_for_medicine(&self.sales.borrow(), medicine_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Writes a new medicine to the store, generating an id when it has none.
    pub async fn add_medicine(&self, mut medicine: Medicine) -> PharmacyResult<Medicine> {
        if medicine.id.trim().is_empty() {
            medicine.id = uuid::Uuid::new_v4().to_string();
        }
        self.store.put_medicine(&medicine).await?;
        log::info!("Added medicine {} ({})", medicine.name, medicine.id);
        Ok(medicine)
    }

    pub async fn update_medicine(&self, medicine: &Medicine) -> PharmacyResult<()> {
        if medicine.id.trim().is_empty() {
            return Err(PharmacyError::MissingId);
        }
        self.store.put_medicine(medicine).await?;
        log::info!("Updated medicine {}", medicine.id);
        Ok(())
    }

    pub async fn delete_medicine(&self, id: &str) -> PharmacyResult<()> {
        if id.trim().is_empty() {
            return Err(PharmacyError::MissingId);
        }
        self.store.remove_medicine(id).await?;
        log::info!("Deleted medicine {}", id);
        Ok(())
    }

    /// Sells `quantity` units of a medicine.
    ///
    /// Returns `Ok(None)` without writing anything when the medicine is unknown,
    /// the quantity is zero, or stock does not cover it. The stock decrement and
    /// the sale are committed together by the store.
    pub async fn record_sale(
        &self,
        medicine_id: &str,
        quantity: u32,
        buyer: &Buyer,
    ) -> PharmacyResult<Option<Sale>> {
        Ok(self
            .sell(medicine_id, quantity, buyer)
            .await?
            .map(|(sale, _)| sale))
    }

    /// Like [`Pharmacy::record_sale`], but also hands back the medicine as the
    /// store committed it.
    async fn sell(
        &self,
        medicine_id: &str,
        quantity: u32,
        buyer: &Buyer,
    ) -> PharmacyResult<Option<(Sale, Medicine)>> {
        let Some(medicine) = self.get_medicine_by_id(medicine_id) else {
            log::warn!("Cannot record sale: medicine {} not found", medicine_id);
            return Ok(None);
        };
        let quantity = match i32::try_from(quantity) {
            Ok(q) if q > 0 && q <= medicine.stock => q,
            _ => {
                log::warn!(
                    "Cannot record sale: requested {} of {} but {} in stock",
                    quantity,
                    medicine.name,
                    medicine.stock
                );
                return Ok(None);
            }
        };

        let sale = Sale::new(medicine_id, quantity, buyer);
        match self.store.commit_sale(&sale).await? {
            SaleCommit::Committed(updated) => {
                log::info!(
                    "Sold {} x {} ({} left)",
                    quantity,
                    updated.name,
                    updated.stock
                );
                Ok(Some((sale, updated)))
            }
            SaleCommit::MissingMedicine => {
                log::warn!("Cannot record sale: medicine {} was removed", medicine_id);
                Ok(None)
            }
            SaleCommit::InsufficientStock { available } => {
                log::warn!(
                    "Cannot record sale: {} in stock for {}, requested {}",
                    available,
                    medicine_id,
                    quantity
                );
                Ok(None)
            }
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn add_to_cart(&mut self, medicine: Medicine) {
        self.cart.add(medicine);
    }

    pub fn remove_from_cart(&mut self, medicine_id: &str) -> Option<Medicine> {
        self.cart.remove(medicine_id)
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    /// Records one sale per distinct medicine in the cart and empties it.
    ///
    /// Entries leave the cart as soon as their sale commits, so a store failure
    /// part way through leaves only the unsold medicines behind.
    pub async fn checkout(&mut self, buyer: &Buyer) -> PharmacyResult<Receipt> {
        if !buyer.is_complete() {
            return Err(PharmacyError::IncompleteBuyer);
        }
        if self.cart.is_empty() {
            return Err(PharmacyError::EmptyCart);
        }

        let mut receipt = Receipt::default();
        for (medicine, quantity) in self.cart.quantities() {
            let sold = match self.sell(&medicine.id, quantity, buyer).await {
                Ok(sold) => sold,
                Err(e) => {
                    log::error!(
                        "Checkout for {} stopped after {} sale(s) worth {:.2}: {}",
                        buyer.name,
                        receipt.sales.len(),
                        receipt.total,
                        e
                    );
                    return Err(e);
                }
            };
            match sold {
                Some((sale, committed)) => {
                    self.cart.remove_all(&medicine.id);
                    receipt.total += committed.price * f64::from(quantity);
                    receipt.sales.push(sale);
                }
                None => receipt.rejected.push(medicine),
            }
        }

        self.cart.clear();
        log::info!(
            "Checkout for {}: {} sale(s), {} rejected",
            buyer.name,
            receipt.sales.len(),
            receipt.rejected.len()
        );
        Ok(receipt)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_user(&self) -> Option<&AuthUser> {
        match &self.session {
            Session::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match &self.session {
            Session::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_loading(&self) -> bool {
        self.session == Session::Authenticating
    }

    /// Message from the last failed login or sign-up, cleared on success.
    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> PharmacyResult<Role> {
        self.session = Session::Authenticating;
        let result = self.sign_in(email, password).await;
        self.finish_authentication(result)
    }

    pub async fn signup(&mut self, email: &str, password: &str) -> PharmacyResult<Role> {
        self.session = Session::Authenticating;
        let result = self.sign_up(email, password).await;
        self.finish_authentication(result)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(AuthUser, Role), AuthError> {
        let user = self.auth.sign_in(email, password).await?;
        let role = self.store.role(&user.uid).await?.unwrap_or_default();
        Ok((user, role))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(AuthUser, Role), AuthError> {
        let user = self.auth.sign_up(email, password).await?;
        self.store.set_role(&user.uid, Role::User).await?;
        Ok((user, Role::User))
    }

    fn finish_authentication(
        &mut self,
        result: Result<(AuthUser, Role), AuthError>,
    ) -> PharmacyResult<Role> {
        match result {
            Ok((user, role)) => {
                log::info!("{} signed in as {}", user.email, role);
                self.auth_error = None;
                self.session = Session::Authenticated { user, role };
                Ok(role)
            }
            Err(e) => {
                log::warn!("Authentication failed: {}", e);
                self.auth_error = Some(e.to_string());
                self.session = Session::Anonymous;
                Err(e.into())
            }
        }
    }

    /// Drops the session locally, then signs out with the provider.
    pub async fn logout(&mut self) -> PharmacyResult<()> {
        let session = std::mem::take(&mut self.session);
        self.cart.clear();
        self.profile = UserProfile::default();
        self.auth_error = None;

        if let Session::Authenticated { user, .. } = session {
            self.auth.sign_out(&user.uid).await?;
            log::info!("{} signed out", user.email);
        }
        Ok(())
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Loads `users/{uid}/profile` into the session. Does nothing when logged out.
    pub async fn load_user_profile(&mut self) -> PharmacyResult<Option<UserProfile>> {
        let Some(uid) = self.current_user().map(|u| u.uid.clone()) else {
            return Ok(None);
        };
        let profile = self.store.profile(&uid).await?;
        if let Some(profile) = &profile {
            self.profile = profile.clone();
        }
        Ok(profile)
    }

    pub async fn update_user_profile(&mut self, profile: UserProfile) -> PharmacyResult<()> {
        let Some(uid) = self.current_user().map(|u| u.uid.clone()) else {
            return Err(PharmacyError::NotAuthenticated);
        };
        self.store.set_profile(&uid, &profile).await?;
        self.profile = profile;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryAuth, MemoryStore};
    use async_trait::async_trait;

    /// Provider whose sign-out always fails.
    struct StuckSignOut(MemoryAuth);

    #[async_trait]
    impl AuthProvider for StuckSignOut {
        async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
            self.0.sign_in(email, password).await
        }

        async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
            self.0.sign_up(email, password).await
        }

        async fn sign_out(&self, _uid: &str) -> Result<(), AuthError> {
            Err(AuthError::Provider("session service unreachable".to_string()))
        }

        fn current_user(&self) -> Option<AuthUser> {
            self.0.current_user()
        }
    }

    fn pharmacy() -> (Arc<MemoryStore>, Pharmacy) {
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(MemoryAuth::new());
        let pharmacy = Pharmacy::new(store.clone(), auth);
        (store, pharmacy)
    }

    #[tokio::test]
    async fn add_medicine_generates_missing_id() {
        let (_, pharmacy) = pharmacy();
        let added = pharmacy
            .add_medicine(Medicine::new("Paracetamol", "Pain reliever", 2.5, 100, "Pain"))
            .await
            .unwrap();
        assert!(!added.id.is_empty());
        assert_eq!(pharmacy.get_medicine_by_id(&added.id), Some(added));
    }

    #[tokio::test]
    async fn update_and_delete_require_an_id() {
        let (_, pharmacy) = pharmacy();
        let nameless = Medicine::new("X", "", 1.0, 1, "");
        assert!(matches!(
            pharmacy.update_medicine(&nameless).await,
            Err(PharmacyError::MissingId)
        ));
        assert!(matches!(
            pharmacy.delete_medicine("").await,
            Err(PharmacyError::MissingId)
        ));
    }

    #[tokio::test]
    async fn zero_quantity_sale_is_ignored() {
        let (store, pharmacy) = pharmacy();
        let added = pharmacy
            .add_medicine(Medicine::new("Ibuprofen", "", 5.0, 3, ""))
            .await
            .unwrap();
        let sale = pharmacy
            .record_sale(&added.id, 0, &Buyer::new("a", "b", "c"))
            .await
            .unwrap();
        assert!(sale.is_none());
        assert!(store.sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_resets_session_state() {
        let (_, mut pharmacy) = pharmacy();
        pharmacy.signup("jane@example.com", "secret1").await.unwrap();
        pharmacy.add_to_cart(Medicine::new("X", "", 1.0, 1, "").with_id("x"));
        pharmacy
            .update_user_profile(UserProfile {
                name: "Jane".into(),
                email: "jane@example.com".into(),
                phone: "555".into(),
            })
            .await
            .unwrap();

        pharmacy.logout().await.unwrap();
        assert_eq!(pharmacy.session(), &Session::Anonymous);
        assert!(pharmacy.cart().is_empty());
        assert_eq!(pharmacy.profile(), &UserProfile::default());
    }

    #[tokio::test]
    async fn failed_sign_out_still_clears_local_state() {
        let store = Arc::new(MemoryStore::new());
        let mut pharmacy = Pharmacy::new(store, Arc::new(StuckSignOut(MemoryAuth::new())));
        pharmacy.signup("jane@example.com", "secret1").await.unwrap();
        pharmacy.add_to_cart(Medicine::new("X", "", 1.0, 1, "").with_id("x"));
        pharmacy
            .update_user_profile(UserProfile {
                name: "Jane".into(),
                email: "jane@example.com".into(),
                phone: "555".into(),
            })
            .await
            .unwrap();

        assert!(matches!(
            pharmacy.logout().await,
            Err(PharmacyError::Auth(AuthError::Provider(_)))
        ));
        assert_eq!(pharmacy.session(), &Session::Anonymous);
        assert!(pharmacy.cart().is_empty());
        assert_eq!(pharmacy.profile(), &UserProfile::default());
    }

    #[tokio::test]
    async fn checkout_total_uses_committed_price() {
        let (store, mut pharmacy) = pharmacy();
        let added = pharmacy
            .add_medicine(Medicine::new("Aspirin", "", 3.0, 10, ""))
            .await
            .unwrap();
        pharmacy.add_to_cart(added.clone());
        pharmacy.add_to_cart(added.clone());

        let mut repriced = added.clone();
        repriced.price = 4.5;
        store.put_medicine(&repriced).await.unwrap();

        let receipt = pharmacy
            .checkout(&Buyer::new("Jane", "Street 1", "555"))
            .await
            .unwrap();
        assert_eq!(receipt.total, 9.0);
        assert_eq!(receipt.sales.len(), 1);
    }
}
