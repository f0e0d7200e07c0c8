use envconfig::Envconfig;
use futures::future;

use medex::backend::{AuthProvider, PgAuth, PgStore, PharmacyStore};
use medex::config::SeedConfig;
use medex::db::init_db;
use medex::{AuthError, Error, Medicine, Role};

fn get_seed_data() -> Vec<Medicine> {
    vec![
        Medicine::new("Paracetamol", "Pain reliever and fever reducer", 2.50, 100, "Pain Relief"),
        Medicine::new("Ibuprofen", "Anti-inflammatory pain reliever", 5.00, 75, "Pain Relief"),
        Medicine::new("Aspirin", "Pain reliever and blood thinner", 3.25, 500, "Pain Relief"),
        Medicine::new("Amoxicillin", "Broad-spectrum antibiotic", 15.00, 50, "Antibiotics"),
        Medicine::new("Lisinopril", "ACE inhibitor for blood pressure", 8.40, 400, "Cardiology"),
        Medicine::new("Amlodipine", "Calcium channel blocker", 6.10, 200, "Cardiology"),
        Medicine::new("Metoprolol", "Beta blocker", 7.75, 275, "Cardiology"),
        Medicine::new("Metformin", "Type 2 diabetes treatment", 4.90, 350, "Diabetes"),
        Medicine::new("Levothyroxine", "Thyroid hormone replacement", 9.30, 250, "Hormones"),
        Medicine::new("Omeprazole", "Reduces stomach acid", 6.80, 450, "Digestive"),
        Medicine::new("Albuterol", "Bronchodilator inhaler", 22.00, 150, "Respiratory"),
        Medicine::new("Gabapentin", "Nerve pain and seizures", 12.60, 300, "Neurology"),
    ]
    .into_iter()
    .map(|m| m.with_id(uuid::Uuid::new_v4().to_string()))
    .collect()
}

async fn seed_database(store: &dyn PharmacyStore) -> Result<usize, Error> {
    let existing = store.medicines().await?;
    let missing: Vec<Medicine> = get_seed_data()
        .into_iter()
        .filter(|seed| !existing.iter().any(|m| m.name.eq_ignore_ascii_case(&seed.name)))
        .collect();

    future::try_join_all(missing.iter().map(|medicine| store.put_medicine(medicine))).await?;
    Ok(missing.len())
}

async fn seed_admin(
    store: &dyn PharmacyStore,
    auth: &dyn AuthProvider,
    email: &str,
    password: &str,
) -> Result<(), Error> {
    let user = match auth.sign_up(email, password).await {
        Ok(user) => user,
        Err(AuthError::EmailInUse) => auth.sign_in(email, password).await?,
        Err(e) => return Err(e.into()),
    };
    store.set_role(&user.uid, Role::Admin).await?;
    log::info!("{} is an administrator", user.email);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenvy::dotenv().ok();

    let config = SeedConfig::init_from_env()?;
    let pool = init_db(&config.database_url).await?;
    let store = PgStore::connect(pool.clone()).await?;
    let auth = PgAuth::new(pool);

    let inserted = seed_database(&store).await?;
    log::info!("Seeded {} medicine(s)", inserted);

    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => seed_admin(&store, &auth, email, password).await?,
        _ => log::warn!("MEDEX_ADMIN_EMAIL / MEDEX_ADMIN_PASSWORD not set; no admin account created"),
    }

    Ok(())
}
