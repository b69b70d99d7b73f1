//! Account registration, login, and the admin approval workflow.
//!
//! The first account ever registered becomes an approved admin; everyone
//! after that starts unapproved and can sign in only once an admin flips
//! the flag. Credential failures and pending approval are distinct typed
//! errors: both end the attempted session action, neither touches stored
//! directory data.

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{DbError, DirectoryDb};
use crate::types::{User, UserRole};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("This account is pending administrator approval")]
    PendingApproval,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Register a new account. The first user in an empty table becomes an
/// approved admin.
pub fn register(
    db: &DirectoryDb,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    if db.get_user_by_email(email)?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let is_first = db.users_table_empty()?;
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.trim().to_lowercase(),
        name: name.trim().to_string(),
        role: if is_first { UserRole::Admin } else { UserRole::User },
        is_approved: is_first,
    };

    let salt = Uuid::new_v4().to_string();
    db.insert_user(&user, &digest_with_salt(&salt, password))?;

    log::info!(
        "Registered account {} ({})",
        user.email,
        if is_first { "admin, auto-approved" } else { "pending approval" }
    );
    Ok(user)
}

/// Authenticate by email and password.
///
/// Unknown email and wrong password are indistinguishable to the caller;
/// an unapproved account is reported separately so the UI can explain the
/// wait instead of blaming the credentials.
pub fn login(db: &DirectoryDb, email: &str, password: &str) -> Result<User, AuthError> {
    let record = db
        .get_user_by_email(email)?
        .ok_or(AuthError::InvalidCredentials)?;

    let (salt, _) = record
        .password_digest
        .split_once('$')
        .ok_or(AuthError::InvalidCredentials)?;
    if digest_with_salt(salt, password) != record.password_digest {
        return Err(AuthError::InvalidCredentials);
    }

    if !record.user.is_approved {
        return Err(AuthError::PendingApproval);
    }

    Ok(record.user)
}

/// All accounts, for the admin panel.
pub fn list_users(db: &DirectoryDb) -> Result<Vec<User>, AuthError> {
    Ok(db.list_users()?)
}

/// Approve a pending account.
pub fn approve_user(db: &DirectoryDb, user_id: &str) -> Result<(), AuthError> {
    set_approval(db, user_id, true)
}

/// Suspend an account (it can no longer sign in until re-approved).
pub fn suspend_user(db: &DirectoryDb, user_id: &str) -> Result<(), AuthError> {
    set_approval(db, user_id, false)
}

fn set_approval(db: &DirectoryDb, user_id: &str, approved: bool) -> Result<(), AuthError> {
    if db.get_user(user_id)?.is_none() {
        return Err(AuthError::UserNotFound(user_id.to_string()));
    }
    db.set_user_approved(user_id, approved)?;
    Ok(())
}

/// Delete an account record. The account's directory data is left in place
/// (there is no cascading deletion rule).
pub fn delete_user(db: &DirectoryDb, user_id: &str) -> Result<(), AuthError> {
    if db.get_user(user_id)?.is_none() {
        return Err(AuthError::UserNotFound(user_id.to_string()));
    }
    db.delete_user(user_id)?;
    Ok(())
}

/// `salt$sha256(salt:password)` as lowercase hex. A plain digest, not a
/// KDF — acceptable for a single-tenant local store, not for a shared
/// server deployment.
fn digest_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{}${}", salt, hex::encode(hasher.finalize()))
}
