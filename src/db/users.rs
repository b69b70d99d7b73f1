use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{DbError, DirectoryDb};
use crate::types::{User, UserRole};

/// A user row including the stored credential digest. Never serialized;
/// the public [`User`] shape is what leaves this module.
#[derive(Debug, Clone)]
pub struct DbUser {
    pub user: User,
    pub password_digest: String,
}

impl DirectoryDb {
    // =========================================================================
    // Users (account approval workflow)
    // =========================================================================

    /// Insert a new user. Fails on duplicate email (UNIQUE constraint).
    pub fn insert_user(&self, user: &User, password_digest: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO users (id, email, name, role, is_approved, password_digest, created_at)
             VALUES (?1, LOWER(?2), ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.name,
                user.role.as_str(),
                user.is_approved as i32,
                password_digest,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up a user by email (case-insensitive), including the digest.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<DbUser>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, name, role, is_approved, password_digest
                 FROM users WHERE email = LOWER(?1)",
                params![email],
                Self::map_user_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Look up a user by id.
    pub fn get_user(&self, id: &str) -> Result<Option<DbUser>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, name, role, is_approved, password_digest
                 FROM users WHERE id = ?1",
                params![id],
                Self::map_user_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All users, oldest account first (admin panel listing).
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, name, role, is_approved, password_digest
             FROM users ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], Self::map_user_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?.user);
        }
        Ok(users)
    }

    /// True when no account exists yet (the next registration becomes the
    /// approved admin).
    pub fn users_table_empty(&self) -> Result<bool, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    /// Flip the approval flag on a user.
    pub fn set_user_approved(&self, id: &str, approved: bool) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE users SET is_approved = ?2 WHERE id = ?1",
            params![id, approved as i32],
        )?;
        Ok(())
    }

    /// Delete a user record. Directory data belonging to the account is not
    /// touched (matching the original's client-side admin semantics).
    pub fn delete_user(&self, id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn map_user_row(row: &Row<'_>) -> rusqlite::Result<DbUser> {
        let role: String = row.get(3)?;
        let is_approved: i32 = row.get(4)?;
        Ok(DbUser {
            user: User {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                role: UserRole::from_str_lossy(&role),
                is_approved: is_approved != 0,
            },
            password_digest: row.get(5)?,
        })
    }
}
