use std::sync::{Arc, RwLock};
use std::time::Duration;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::watch;

use super::{
    normalize_email, validate_credentials, AuthProvider, PharmacyStore, SaleCommit,
};
use crate::db::models::{AuthUser, Medicine, Role, Sale, UserProfile};
use crate::db::{MEDICINES_CHANNEL, SALES_CHANNEL};
use crate::error::{AuthError, StoreError, StoreResult};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store. Collection changes are broadcast with `pg_notify`
/// and every process re-publishes a fresh snapshot to its watchers.
pub struct PgStore {
    pool: PgPool,
    medicines: Arc<watch::Sender<Vec<Medicine>>>,
    sales: Arc<watch::Sender<Vec<Sale>>>,
}

impl PgStore {
    /// Loads the initial snapshots and starts the change listener.
    pub async fn connect(pool: PgPool) -> StoreResult<Self> {
        let medicines = fetch_medicines(&pool).await?;
        let sales = fetch_sales(&pool).await?;
        let (medicines, _) = watch::channel(medicines);
        let (sales, _) = watch::channel(sales);

        let store = PgStore {
            pool,
            medicines: Arc::new(medicines),
            sales: Arc::new(sales),
        };
        store.spawn_listener().await?;
        Ok(store)
    }

    async fn spawn_listener(&self) -> StoreResult<()> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener
            .listen_all([MEDICINES_CHANNEL, SALES_CHANNEL])
            .await?;

        let pool = self.pool.clone();
        let medicines = Arc::clone(&self.medicines);
        let sales = Arc::clone(&self.sales);

        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        let result = match notification.channel() {
                            MEDICINES_CHANNEL => fetch_medicines(&pool)
                                .await
                                .map(|list| {
                                    medicines.send_replace(list);
                                }),
                            SALES_CHANNEL => fetch_sales(&pool)
                                .await
                                .map(|list| {
                                    sales.send_replace(list);
                                }),
                            other => {
                                log::debug!("Ignoring notification on channel {}", other);
                                Ok(())
                            }
                        };
                        if let Err(e) = result {
                            log::error!("Failed to refresh snapshot: {}", e);
                        }
                    }
                    Err(e) => {
                        log::error!("Change listener error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        log::info!("Listening for catalog changes");
        Ok(())
    }

    async fn refresh_medicines(&self) -> StoreResult<()> {
        let list = fetch_medicines(&self.pool).await?;
        self.medicines.send_replace(list);
        Ok(())
    }

    async fn refresh_sales(&self) -> StoreResult<()> {
        let list = fetch_sales(&self.pool).await?;
        self.sales.send_replace(list);
        Ok(())
    }

    async fn notify(&self, channel: &str) -> StoreResult<()> {
        sqlx::query("SELECT pg_notify($1, '')")
            .bind(channel)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Announces a write that is already committed. Failing here only leaves
    /// snapshots stale until the next notification.
    async fn announce(&self, channel: &str) {
        if let Err(e) = self.notify(channel).await {
            log::warn!("Could not notify {}: {}", channel, e);
        }
        let refreshed = if channel == SALES_CHANNEL {
            self.refresh_sales().await
        } else {
            self.refresh_medicines().await
        };
        snapshot_refreshed(refreshed, channel);
    }
}

fn snapshot_refreshed(result: StoreResult<()>, channel: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Snapshot for {} is stale until the next change: {}", channel, e);
            false
        }
    }
}

async fn fetch_medicines(pool: &PgPool) -> StoreResult<Vec<Medicine>> {
    Ok(
        sqlx::query_as::<_, Medicine>("SELECT * FROM medicines ORDER BY name, id")
            .fetch_all(pool)
            .await?,
    )
}

async fn fetch_sales(pool: &PgPool) -> StoreResult<Vec<Sale>> {
    Ok(
        sqlx::query_as::<_, Sale>("SELECT * FROM sales ORDER BY sold_at, id")
            .fetch_all(pool)
            .await?,
    )
}

#[async_trait]
impl PharmacyStore for PgStore {
    async fn medicines(&self) -> StoreResult<Vec<Medicine>> {
        fetch_medicines(&self.pool).await
    }

    async fn put_medicine(&self, medicine: &Medicine) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO medicines (id, name, description, price, stock, image_url, category) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description, \
             price = EXCLUDED.price, stock = EXCLUDED.stock, image_url = EXCLUDED.image_url, \
             category = EXCLUDED.category",
        )
        .bind(&medicine.id)
        .bind(&medicine.name)
        .bind(&medicine.description)
        .bind(medicine.price)
        .bind(medicine.stock)
        .bind(&medicine.image_url)
        .bind(&medicine.category)
        .execute(&self.pool)
        .await?;

        self.announce(MEDICINES_CHANNEL).await;
        Ok(())
    }

    async fn remove_medicine(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM medicines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.announce(MEDICINES_CHANNEL).await;
        Ok(())
    }

    async fn sales(&self) -> StoreResult<Vec<Sale>> {
        fetch_sales(&self.pool).await
    }

    async fn commit_sale(&self, sale: &Sale) -> StoreResult<SaleCommit> {
        let mut transaction = self.pool.begin().await?;

        // The guarded update is the stock check; it only matches rows that can cover the quantity.
        let updated = sqlx::query_as::<_, Medicine>(
            "UPDATE medicines SET stock = stock - $1 WHERE id = $2 AND stock >= $1 RETURNING *",
        )
        .bind(sale.quantity)
        .bind(&sale.medicine_id)
        .fetch_optional(&mut *transaction)
        .await?;

        let Some(updated) = updated else {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT stock FROM medicines WHERE id = $1")
                    .bind(&sale.medicine_id)
                    .fetch_optional(&mut *transaction)
                    .await?;
            transaction.rollback().await?;
            return Ok(match available {
                Some(available) => SaleCommit::InsufficientStock { available },
                None => SaleCommit::MissingMedicine,
            });
        };

        sqlx::query(
            "INSERT INTO sales (id, medicine_id, quantity, sold_at, buyer_name, buyer_address, buyer_phone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&sale.id)
        .bind(&sale.medicine_id)
        .bind(sale.quantity)
        .bind(sale.sold_at)
        .bind(&sale.buyer_name)
        .bind(&sale.buyer_address)
        .bind(&sale.buyer_phone)
        .execute(&mut *transaction)
        .await?;

        // Notifications are only delivered once the transaction commits.
        for channel in [MEDICINES_CHANNEL, SALES_CHANNEL] {
            sqlx::query("SELECT pg_notify($1, '')")
                .bind(channel)
                .execute(&mut *transaction)
                .await?;
        }

        transaction.commit().await?;

        // Committed; the listener catches up if these refreshes fail.
        snapshot_refreshed(self.refresh_medicines().await, MEDICINES_CHANNEL);
        snapshot_refreshed(self.refresh_sales().await, SALES_CHANNEL);
        Ok(SaleCommit::Committed(updated))
    }

    async fn role(&self, uid: &str) -> StoreResult<Option<Role>> {
        let role: Option<Option<String>> =
            sqlx::query_scalar("SELECT role FROM users WHERE uid = $1")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;

        Ok(role.flatten().and_then(|raw| match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                log::warn!("Ignoring stored role for {}: {}", uid, e);
                None
            }
        }))
    }

    async fn set_role(&self, uid: &str, role: Role) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (uid, role) VALUES ($1, $2) \
             ON CONFLICT (uid) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(uid)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn profile(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        let row: Option<(Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT name, email, phone FROM users WHERE uid = $1")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(name, email, phone)| {
            if name.is_none() && email.is_none() && phone.is_none() {
                return None;
            }
            Some(UserProfile {
                name: name.unwrap_or_default(),
                email: email.unwrap_or_default(),
                phone: phone.unwrap_or_default(),
            })
        }))
    }

    async fn set_profile(&self, uid: &str, profile: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (uid, name, email, phone) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (uid) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email, \
             phone = EXCLUDED.phone",
        )
        .bind(uid)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn watch_medicines(&self) -> watch::Receiver<Vec<Medicine>> {
        self.medicines.subscribe()
    }

    fn watch_sales(&self) -> watch::Receiver<Vec<Sale>> {
        self.sales.subscribe()
    }
}

/// Email/password accounts stored in the `accounts` table as Argon2 PHC strings.
pub struct PgAuth {
    pool: PgPool,
    current: RwLock<Option<AuthUser>>,
}

impl PgAuth {
    pub fn new(pool: PgPool) -> Self {
        PgAuth {
            pool,
            current: RwLock::new(None),
        }
    }

    fn set_current(&self, user: Option<AuthUser>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = user;
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Provider(format!("Could not secure the password: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            log::warn!("Ignoring unreadable password hash: {}", e);
            false
        }
    }
}

#[async_trait]
impl AuthProvider for PgAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email);
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT uid, password_hash FROM accounts WHERE email = $1")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from)?;

        let (uid, stored) = row.ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &stored) {
            return Err(AuthError::InvalidCredentials);
        }

        let user = AuthUser { uid, email };
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        validate_credentials(email, password)?;
        let email = normalize_email(email);
        let uid = uuid::Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;

        let inserted =
            sqlx::query("INSERT INTO accounts (uid, email, password_hash) VALUES ($1, $2, $3)")
                .bind(&uid)
                .bind(&email)
                .bind(&password_hash)
                .execute(&self.pool)
                .await;

        if let Err(e) = inserted {
            let duplicate = e
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == UNIQUE_VIOLATION);
            return Err(if duplicate {
                AuthError::EmailInUse
            } else {
                StoreError::from(e).into()
            });
        }

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

    #[test]
    fn password_hashes_verify_and_are_salted() {
        let first = hash_password("secret1").unwrap();
        let second = hash_password("secret1").unwrap();
        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);

        assert!(verify_password("secret1", &first));
        assert!(verify_password("secret1", &second));
        assert!(!verify_password("secret2", &first));
    }

    #[test]
    fn unreadable_hash_never_verifies() {
        assert!(!verify_password("secret1", ""));
        assert!(!verify_password("secret1", "not-a-phc-string"));
    }

    #[test]
    fn refresh_failure_after_commit_is_not_an_error() {
        assert!(snapshot_refreshed(Ok(()), SALES_CHANNEL));
        assert!(!snapshot_refreshed(
            Err(StoreError::Unavailable("connection reset".to_string())),
            MEDICINES_CHANNEL
        ));
    }
}
