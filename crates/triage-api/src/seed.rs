use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use triage_db::models::{UserRow, format_timestamp, now};
use triage_db::{Database, is_unique_violation};
use triage_types::models::Role;

use crate::auth::hash_password;

/// The bootstrap developer account created on first run.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub name: String,
    pub username: String,
    pub password: String,
}

/// Create the seed developer unless an account with its username already
/// exists. Returns true if an account was created. Safe to call on every
/// startup.
pub fn ensure_seed_account(db: &Database, seed: &SeedAccount) -> Result<bool> {
    if db.get_user_by_username(&seed.username)?.is_some() {
        return Ok(false);
    }

    let row = UserRow {
        id: Uuid::new_v4().to_string(),
        name: seed.name.clone(),
        username: seed.username.clone(),
        password_hash: hash_password(&seed.password)?,
        role: Role::Developer.as_str().to_string(),
        push_token: None,
        created_at: format_timestamp(&now()),
    };

    match db.insert_user(&row) {
        Ok(()) => {
            info!("Seeded developer account '{}'", seed.username);
            Ok(true)
        }
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e),
    }
}
