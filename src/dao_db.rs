use chrono::Utc;
use log::{info, warn};
use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, Database};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::Config;
use crate::models::user::{normalize_email, User, UserRole};

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoDB { client, db }
    }

    /// Bootstraps the seed administrator when the users collection is empty.
    /// Without seed credentials the server still starts, but nobody can log in
    /// until a user document is created out of band.
    pub async fn ensure_seed_admin(&self, config: &Config) {
        let users = self.db.collection::<User>("users");
        let count = users
            .count_documents(doc! {})
            .await
            .expect("Failed to count users");
        if count > 0 {
            return;
        }

        let (email, password) = match (&config.seed_admin_email, &config.seed_admin_password) {
            (Some(email), Some(password)) => (email.clone(), password.clone()),
            _ => {
                warn!("users collection is empty and ADMIN_EMAIL/ADMIN_PASSWORD are not set");
                return;
            }
        };

        let admin = User {
            id: Uuid::new_v4().to_string(),
            name: "Administrateur".to_string(),
            email: normalize_email(&email),
            password: hash_password(&password).expect("Failed to hash seed admin password"),
            role: UserRole::Admin,
            is_active: true,
            last_login: None,
            reset_token: None,
            reset_token_expires: None,
            created_at: Utc::now(),
        };
        users
            .insert_one(&admin)
            .await
            .expect("Failed to insert seed admin");
        info!("seed admin {} created", admin.email);
    }
}
