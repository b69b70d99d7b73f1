use chrono::Utc;
use rusqlite::{params, Row};

use super::{DbError, DirectoryDb};
use crate::types::{Member, Reference};

impl DirectoryDb {
    // =========================================================================
    // Members
    // =========================================================================

    /// Write a member row in full (set semantics: the caller has already
    /// applied the merge, this persists the resulting document). Returns
    /// true if the member was newly inserted.
    pub fn upsert_member(&self, member: &Member) -> Result<bool, DbError> {
        // Check existence before upsert to detect new inserts
        let existed: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM members WHERE id = ?1)",
                params![member.id],
                |row| row.get(0),
            )
            .unwrap_or(true);

        let references_json = serde_json::to_string(&member.references)?;

        self.conn.execute(
            "INSERT INTO members (
                id, owner_id, name, company, sector, phone, created_at,
                references_json, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                company = excluded.company,
                sector = excluded.sector,
                phone = excluded.phone,
                references_json = excluded.references_json,
                updated_at = excluded.updated_at",
            params![
                member.id,
                member.owner_id,
                member.name,
                member.company,
                member.sector,
                member.phone,
                member.created_at,
                references_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(!existed)
    }

    /// Look up a member by id.
    pub fn get_member(&self, id: &str) -> Result<Option<Member>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, name, company, sector, phone, created_at, references_json
             FROM members WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_member_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All members for an owner, sorted alphabetically by display name.
    pub fn list_members(&self, owner_id: &str) -> Result<Vec<Member>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, name, company, sector, phone, created_at, references_json
             FROM members WHERE owner_id = ?1
             ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![owner_id], Self::map_member_row)?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Delete a member by id. No cascade: guests that reference this member
    /// as inviter keep their (now dangling) weak reference.
    pub fn delete_member(&self, id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM members WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Partial profile update: only the provided fields change. The id is
    /// never re-derived — a manual rename does not move history.
    pub fn update_member_profile(
        &self,
        id: &str,
        update: &MemberProfileUpdate,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE members SET
                name = COALESCE(?2, name),
                company = COALESCE(?3, company),
                sector = COALESCE(?4, sector),
                phone = COALESCE(?5, phone),
                updated_at = ?6
             WHERE id = ?1",
            params![
                id,
                update.name,
                update.company,
                update.sector,
                update.phone,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn map_member_row(row: &Row<'_>) -> rusqlite::Result<Member> {
        // A corrupted column must surface as an error. Defaulting to an
        // empty history here would be made permanent by the next upsert.
        let references_json: String = row.get(7)?;
        let references: Vec<Reference> = serde_json::from_str(&references_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Member {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            company: row.get(3)?,
            sector: row.get(4)?,
            phone: row.get(5)?,
            created_at: row.get(6)?,
            references,
        })
    }
}

/// Fields a manual profile edit may change. `None` leaves the stored value
/// untouched.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfileUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub sector: Option<String>,
    pub phone: Option<String>,
}
