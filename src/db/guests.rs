use chrono::Utc;
use rusqlite::{params, Row};

use super::{DbError, DirectoryDb};
use crate::types::Guest;

impl DirectoryDb {
    // =========================================================================
    // Guests
    // =========================================================================

    /// Append a guest row. Guests are never merged: the same visitor at two
    /// meetings is two rows, and re-running a batch adds another row (known
    /// limitation, accepted for retry safety).
    pub fn insert_guest(&self, guest: &Guest) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO guests (
                id, owner_id, name, company, sector, phone, visit_date,
                invited_by_member_id, invited_by_member_name, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                guest.id,
                guest.owner_id,
                guest.name,
                guest.company,
                guest.sector,
                guest.phone,
                guest.visit_date,
                guest.invited_by_member_id,
                guest.invited_by_member_name,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All guests for an owner, most recent visit first.
    pub fn list_guests(&self, owner_id: &str) -> Result<Vec<Guest>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, name, company, sector, phone, visit_date,
                    invited_by_member_id, invited_by_member_name
             FROM guests WHERE owner_id = ?1
             ORDER BY visit_date DESC, created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], Self::map_guest_row)?;
        let mut guests = Vec::new();
        for row in rows {
            guests.push(row?);
        }
        Ok(guests)
    }

    /// Delete a guest row by id.
    pub fn delete_guest(&self, id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM guests WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn map_guest_row(row: &Row<'_>) -> rusqlite::Result<Guest> {
        Ok(Guest {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            company: row.get(3)?,
            sector: row.get(4)?,
            phone: row.get(5)?,
            visit_date: row.get(6)?,
            invited_by_member_id: row.get(7)?,
            invited_by_member_name: row.get(8)?,
        })
    }
}
